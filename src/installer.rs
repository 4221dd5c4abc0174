//! Dependency installation into the staging directory.
//!
//! Resolution is entirely the package manager's job; this module only tells
//! it which manifest to read and where to put the result.
use crate::tool::ToolCommand;
use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::path::Path;

pub const DEFAULT_INSTALLER_COMMAND: &str = "pip";

/// Installs the packages listed in a manifest into a target directory.
pub trait Installer {
    fn install(&self, requirements: &Path, target: &Path) -> Result<()>;
}

/// `pip install -r <manifest> -t <target>` (or any pip-compatible command).
pub struct PipInstaller {
    command: ToolCommand,
}

impl PipInstaller {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    fn install_args(requirements: &Path, target: &Path) -> Vec<OsString> {
        vec![
            "install".into(),
            "--requirement".into(),
            requirements.into(),
            "--target".into(),
            target.into(),
        ]
    }
}

impl Installer for PipInstaller {
    fn install(&self, requirements: &Path, target: &Path) -> Result<()> {
        if !requirements.is_file() {
            return Err(anyhow!(
                "requirements manifest not found: {}",
                requirements.display()
            ));
        }
        tracing::info!(
            requirements = %requirements.display(),
            target = %target.display(),
            "installing dependencies"
        );
        self.command
            .run(Self::install_args(requirements, target), None)
    }
}
