//! CLI argument parsing for the bundle command.
//!
//! Exactly one positional argument is accepted: the JSON config to embed.
//! Every flag is optional and only overrides part of the layout.
use crate::archive::DEFAULT_ZIP_COMMAND;
use crate::installer::DEFAULT_INSTALLER_COMMAND;
use crate::layout::{BundleLayout, ModuleFormat};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lpack",
    version,
    about = "Bundle a function entry point, runtime files, dependencies and config into a zip",
    after_help = "Defaults:\n  runtime files   bin/*\n  entry point     main.py\n  requirements    requirements.txt\n  staging dir     dist (removed after archiving)\n  archive         dist.zip\n\nExamples:\n  lpack config.json\n  lpack --installer 'python3 -m pip' --report report.json config.json\n  lpack --layout lpack.json --keep-on-failure config.json"
)]
pub struct RootArgs {
    /// JSON config embedded into the generated config module
    #[arg(value_name = "CONFIG_JSON")]
    pub config: PathBuf,

    /// Layout file (JSON) overriding the default paths and names
    #[arg(long, value_name = "PATH")]
    pub layout: Option<PathBuf>,

    /// Staging directory
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Output zip archive
    #[arg(long, value_name = "PATH")]
    pub archive: Option<PathBuf>,

    /// Directory whose top-level files are bundled next to the entry point
    #[arg(long, value_name = "DIR")]
    pub runtime_dir: Option<PathBuf>,

    /// Entry-point source file
    #[arg(long, value_name = "PATH")]
    pub entry_point: Option<PathBuf>,

    /// Requirements manifest passed to the installer
    #[arg(long, value_name = "PATH")]
    pub requirements: Option<PathBuf>,

    /// How the config is embedded in the generated module
    #[arg(long, value_enum)]
    pub module_format: Option<ModuleFormat>,

    /// Package installer command (pip-compatible)
    #[arg(long, value_name = "CMD", default_value = DEFAULT_INSTALLER_COMMAND)]
    pub installer: String,

    /// Zip command
    #[arg(long = "zip", value_name = "CMD", default_value = DEFAULT_ZIP_COMMAND)]
    pub zip: String,

    /// Leave the staging directory in place if a step fails
    #[arg(long)]
    pub keep_on_failure: bool,

    /// Write a JSON report of the finished bundle
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Log each step to stderr
    #[arg(long, short)]
    pub verbose: bool,
}

impl RootArgs {
    /// Apply flag overrides on top of a loaded or default layout.
    pub fn apply_overrides(&self, layout: &mut BundleLayout) {
        if let Some(out_dir) = &self.out_dir {
            layout.out_dir = out_dir.clone();
        }
        if let Some(archive) = &self.archive {
            layout.archive = archive.clone();
        }
        if let Some(runtime_dir) = &self.runtime_dir {
            layout.runtime_dir = runtime_dir.clone();
        }
        if let Some(entry_point) = &self.entry_point {
            layout.entry_point = entry_point.clone();
        }
        if let Some(requirements) = &self.requirements {
            layout.requirements = requirements.clone();
        }
        if let Some(format) = self.module_format {
            layout.module_format = format;
        }
    }
}
