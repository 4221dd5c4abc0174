//! Bundle layout: every path and name a run reads or writes.
//!
//! The defaults reproduce the classic `dist` / `dist.zip` layout. A layout
//! file can replace any of them, and CLI flags override the file.
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const LAYOUT_SCHEMA_VERSION: u32 = 1;

/// How the parsed config is embedded in the generated module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModuleFormat {
    /// A Python literal assigned directly to the attribute.
    Literal,
    /// Compact JSON text decoded with `json.loads` at import time.
    Json,
}

/// Paths and names used by one bundle run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleLayout {
    pub schema_version: u32,
    /// Staging directory, removed after archiving.
    pub out_dir: PathBuf,
    /// Final zip archive.
    pub archive: PathBuf,
    /// Directory whose top-level files ship next to the entry point.
    pub runtime_dir: PathBuf,
    pub entry_point: PathBuf,
    /// Requirements manifest handed to the installer.
    pub requirements: PathBuf,
    /// File name of the generated module inside the staging directory.
    pub config_module: String,
    pub class_name: String,
    pub attribute: String,
    pub module_format: ModuleFormat,
}

impl Default for BundleLayout {
    fn default() -> Self {
        Self {
            schema_version: LAYOUT_SCHEMA_VERSION,
            out_dir: PathBuf::from("dist"),
            archive: PathBuf::from("dist.zip"),
            runtime_dir: PathBuf::from("bin"),
            entry_point: PathBuf::from("main.py"),
            requirements: PathBuf::from("requirements.txt"),
            config_module: "config.py".to_string(),
            class_name: "Config".to_string(),
            attribute: "setting".to_string(),
            module_format: ModuleFormat::Literal,
        }
    }
}

impl BundleLayout {
    /// Resolve relative paths against `base` so child processes with a
    /// different working directory still see the same files. `.` and `..`
    /// are folded away so containment checks compare like with like.
    pub fn resolved(&self, base: &Path) -> BundleLayout {
        let join = |path: &Path| normalize_path(&base.join(path));
        BundleLayout {
            out_dir: join(&self.out_dir),
            archive: join(&self.archive),
            runtime_dir: join(&self.runtime_dir),
            entry_point: join(&self.entry_point),
            requirements: join(&self.requirements),
            ..self.clone()
        }
    }

    /// Advisory lock file guarding the staging directory and archive.
    pub fn lock_path(&self) -> PathBuf {
        let name = self
            .out_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "dist".to_string());
        self.out_dir.with_file_name(format!(".{name}.lock"))
    }
}

/// Load a layout file. Omitted fields keep their defaults.
pub fn load_layout(path: &Path) -> Result<BundleLayout> {
    let bytes = fs::read(path).with_context(|| format!("read layout {}", path.display()))?;
    let layout: BundleLayout =
        serde_json::from_slice(&bytes).with_context(|| format!("parse layout {}", path.display()))?;
    Ok(layout)
}

/// Lexically fold `.` and `..` out of `path` without touching the disk.
///
/// `..` at the root stays at the root; leading `..` of a relative path is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Fail when `path` lies inside the staging directory, which is wiped at
/// the start and end of every run.
pub fn ensure_outside_out_dir(layout: &BundleLayout, label: &str, path: &Path) -> Result<()> {
    if path.starts_with(&layout.out_dir) {
        return Err(anyhow!(
            "{label} {} must not live inside out_dir {}",
            path.display(),
            layout.out_dir.display()
        ));
    }
    Ok(())
}

/// Reject layouts that would produce a broken module or clobber inputs.
///
/// Expects a layout already passed through [`BundleLayout::resolved`] with
/// `workdir` as the base.
pub fn validate_layout(layout: &BundleLayout, workdir: &Path) -> Result<()> {
    if layout.schema_version != LAYOUT_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported layout schema_version {}",
            layout.schema_version
        ));
    }

    let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").context("compile identifier regex")?;
    for (label, value) in [
        ("class_name", &layout.class_name),
        ("attribute", &layout.attribute),
    ] {
        if !identifier.is_match(value) {
            return Err(anyhow!("{label} {value:?} is not a valid identifier"));
        }
    }

    let module = Path::new(&layout.config_module);
    let is_bare_name = module.components().count() == 1
        && matches!(module.components().next(), Some(Component::Normal(_)));
    if !is_bare_name {
        return Err(anyhow!(
            "config_module {:?} must be a plain file name",
            layout.config_module
        ));
    }

    if layout.out_dir.file_name().is_none() {
        return Err(anyhow!(
            "out_dir {:?} must name a directory",
            layout.out_dir.display().to_string()
        ));
    }
    if workdir.starts_with(&layout.out_dir) {
        return Err(anyhow!(
            "out_dir {} must not contain the working directory {}",
            layout.out_dir.display(),
            workdir.display()
        ));
    }
    if layout.archive.file_name().is_none() || workdir.starts_with(&layout.archive) {
        return Err(anyhow!(
            "archive {:?} must name a file",
            layout.archive.display().to_string()
        ));
    }
    if layout.archive.starts_with(&layout.out_dir) {
        return Err(anyhow!(
            "archive {} must live outside out_dir {}",
            layout.archive.display(),
            layout.out_dir.display()
        ));
    }
    ensure_outside_out_dir(layout, "runtime_dir", &layout.runtime_dir)?;
    ensure_outside_out_dir(layout, "entry_point", &layout.entry_point)?;
    ensure_outside_out_dir(layout, "requirements", &layout.requirements)?;
    Ok(())
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
