use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;

mod archive;
mod cli;
mod config_module;
mod error;
mod installer;
mod layout;
mod lock;
mod logging;
mod pipeline;
mod staging;
mod tool;

use crate::archive::ZipArchiver;
use crate::cli::RootArgs;
use crate::error::ToolError;
use crate::installer::PipInstaller;
use crate::layout::{
    ensure_outside_out_dir, load_layout, normalize_path, validate_layout, BundleLayout,
};
use crate::pipeline::{run_bundle, write_report, BundleRequest};
use crate::tool::ToolCommand;

fn main() -> ExitCode {
    let args = match RootArgs::try_parse() {
        Ok(args) => args,
        Err(err) => return usage_exit(err),
    };
    logging::setup_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Help and version go to stdout with success; anything else is a usage
/// error reported on stderr with status 1, before any filesystem access.
fn usage_exit(err: clap::Error) -> ExitCode {
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::from(1),
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ToolError>())
        .and_then(|tool_err| u8::try_from(tool_err.exit_code()).ok())
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

fn run(args: RootArgs) -> Result<()> {
    let mut layout = match &args.layout {
        Some(path) => load_layout(path)?,
        None => BundleLayout::default(),
    };
    args.apply_overrides(&mut layout);

    let cwd = std::env::current_dir().context("resolve working directory")?;
    let layout = layout.resolved(&cwd);
    validate_layout(&layout, &cwd)?;
    let config = normalize_path(&cwd.join(&args.config));
    ensure_outside_out_dir(&layout, "config", &config)?;

    let installer = PipInstaller::new(ToolCommand::parse("installer", &args.installer)?);
    let archiver = ZipArchiver::new(ToolCommand::parse("archiver", &args.zip)?);

    let request = BundleRequest {
        config,
        layout,
        keep_on_failure: args.keep_on_failure,
    };
    let report = run_bundle(&request, &installer, &archiver)?;

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        println!("Wrote bundle report to {}", path.display());
    }
    println!(
        "Wrote {} ({} files, {} bytes)",
        report.archive.display(),
        report.entries.len(),
        report.archive_bytes
    );
    Ok(())
}
