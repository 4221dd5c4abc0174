//! Compression of the staging directory into the final zip archive.
use crate::tool::ToolCommand;
use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::Path;

pub const DEFAULT_ZIP_COMMAND: &str = "zip";

/// Packs the contents of a directory into an archive file.
///
/// Entries must be rooted at the archive top level, with no enclosing
/// directory, and an existing archive must be replaced rather than updated.
pub trait Archiver {
    fn archive(&self, source_dir: &Path, archive: &Path) -> Result<()>;
}

/// Archiver backed by the Info-ZIP `zip` command.
pub struct ZipArchiver {
    command: ToolCommand,
}

impl ZipArchiver {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    fn zip_args(output: &Path) -> Vec<OsString> {
        vec!["-r".into(), "-q".into(), "-X".into(), output.into(), ".".into()]
    }
}

impl Archiver for ZipArchiver {
    fn archive(&self, source_dir: &Path, archive: &Path) -> Result<()> {
        if !source_dir.is_dir() {
            return Err(anyhow!("{} is not a directory", source_dir.display()));
        }
        let parent = match archive.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        let parent = parent
            .canonicalize()
            .with_context(|| format!("resolve {}", parent.display()))?;
        let file_name = archive
            .file_name()
            .ok_or_else(|| anyhow!("archive {} has no file name", archive.display()))?;

        // zip updates an existing archive in place, so build a fresh one
        // beside the target and rename it over.
        let scratch = tempfile::Builder::new()
            .prefix(".lpack-")
            .tempdir_in(&parent)
            .with_context(|| format!("create scratch dir in {}", parent.display()))?;
        let partial = scratch.path().join(file_name);

        self.command
            .run(Self::zip_args(&partial), Some(source_dir))?;

        let target = parent.join(file_name);
        fs::rename(&partial, &target)
            .with_context(|| format!("move archive into {}", target.display()))?;
        tracing::info!(archive = %target.display(), "archive written");
        Ok(())
    }
}
