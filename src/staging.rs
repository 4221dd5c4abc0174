//! Staging directory population.
//!
//! Everything that ends up in the archive is first assembled under the
//! staging root; nothing is written next to the inputs.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Create an empty staging root, creating parents as needed.
///
/// Leftovers from an earlier kept-on-failure run are cleared first so they
/// never reach the archive.
pub fn prepare_staging(staging_root: &Path) -> Result<()> {
    remove_staging(staging_root)?;
    fs::create_dir_all(staging_root)
        .with_context(|| format!("create {}", staging_root.display()))?;
    Ok(())
}

/// Copy each regular file directly under `source_dir` into the staging root.
///
/// Subdirectories are skipped and same-named files are overwritten.
/// Returns the copied file names, sorted.
pub fn stage_runtime_files(source_dir: &Path, staging_root: &Path) -> Result<Vec<String>> {
    let mut staged = Vec::new();
    let entries =
        fs::read_dir(source_dir).with_context(|| format!("read {}", source_dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read {}", source_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "skipping non-file runtime entry");
            continue;
        }
        let name = entry.file_name();
        copy_into(&path, &staging_root.join(&name))?;
        staged.push(name.to_string_lossy().to_string());
    }
    staged.sort();
    Ok(staged)
}

/// Copy a single file into the staging root under its own file name.
pub fn stage_file(source: &Path, staging_root: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| anyhow!("{} has no file name", source.display()))?;
    if !source.is_file() {
        return Err(anyhow!("{} is not a file", source.display()));
    }
    let dest = staging_root.join(name);
    copy_into(source, &dest)?;
    Ok(dest)
}

pub fn write_staged_bytes(staging_root: &Path, rel_path: &str, bytes: &[u8]) -> Result<PathBuf> {
    let staging_path = staging_root.join(rel_path);
    if let Some(parent) = staging_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&staging_path, bytes).with_context(|| format!("write {}", staging_path.display()))?;
    Ok(staging_path)
}

pub fn write_staged_text(staging_root: &Path, rel_path: &str, text: &str) -> Result<PathBuf> {
    write_staged_bytes(staging_root, rel_path, text.as_bytes())
}

/// All files under `root`, recursively, as sorted paths relative to `root`.
pub fn collect_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_into(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_into(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_into(root, &path, files)?;
        } else if path.is_file() {
            let rel = path
                .strip_prefix(root)
                .context("strip staging prefix")?
                .to_path_buf();
            files.push(rel);
        }
    }
    Ok(())
}

/// Remove the staging root and everything under it. Missing is fine.
pub fn remove_staging(staging_root: &Path) -> Result<()> {
    match fs::remove_dir_all(staging_root) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", staging_root.display())),
    }
}

fn copy_into(source: &Path, dest: &Path) -> Result<()> {
    // fs::copy carries permission bits, so executables stay executable.
    fs::copy(source, dest)
        .with_context(|| format!("copy {} to {}", source.display(), dest.display()))?;
    Ok(())
}
