//! The bundle pipeline: stage, install, synthesize config, archive, clean up.
//!
//! Stages run strictly in order and the first failure aborts the run. The
//! installer and archiver are injected so the pipeline can be exercised
//! without spawning real tools.
use crate::archive::Archiver;
use crate::config_module::synthesize_config_module;
use crate::installer::Installer;
use crate::layout::BundleLayout;
use crate::lock::acquire_run_lock;
use crate::staging::{
    collect_files_recursive, prepare_staging, remove_staging, stage_file, stage_runtime_files,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Inputs for one bundle run. Layout paths should already be absolute.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub config: PathBuf,
    pub layout: BundleLayout,
    /// Leave the staging directory in place when a stage fails.
    pub keep_on_failure: bool,
}

/// Elapsed time of one pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed_ms: u128,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
    pub archive: PathBuf,
    pub archive_bytes: u64,
    pub config_source: PathBuf,
    /// Archive entries relative to the archive root, sorted.
    pub entries: Vec<PathBuf>,
    pub runtime_files: Vec<String>,
    pub stages: Vec<StageTiming>,
    /// Set when the archive was written but the staging dir could not be removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
}

/// Removes the staging directory on drop unless disarmed.
struct StagingGuard<'a> {
    root: &'a Path,
    armed: bool,
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match remove_staging(self.root) {
            Ok(()) => tracing::info!(staging = %self.root.display(), "removed partial staging dir"),
            Err(err) => tracing::warn!(
                staging = %self.root.display(),
                error = %format!("{err:#}"),
                "failed to remove partial staging dir"
            ),
        }
    }
}

struct StageClock {
    stages: Vec<StageTiming>,
}

impl StageClock {
    fn run<T>(&mut self, stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        tracing::debug!(stage, "stage start");
        let result = f().with_context(|| format!("{stage} step failed"));
        let elapsed_ms = start.elapsed().as_millis();
        match &result {
            Ok(_) => tracing::info!(stage, elapsed_ms, "stage complete"),
            Err(_) => tracing::warn!(stage, elapsed_ms, "stage failed"),
        }
        self.stages.push(StageTiming { stage, elapsed_ms });
        result
    }
}

/// Build the archive described by `request`.
pub fn run_bundle(
    request: &BundleRequest,
    installer: &dyn Installer,
    archiver: &dyn Archiver,
) -> Result<BundleReport> {
    let layout = &request.layout;
    let _lock = acquire_run_lock(&layout.lock_path())?;
    let staging = layout.out_dir.as_path();

    let mut guard = StagingGuard {
        root: staging,
        armed: !request.keep_on_failure,
    };
    let mut clock = StageClock { stages: Vec::new() };

    let runtime_files = clock.run("staging", || {
        prepare_staging(staging)?;
        let runtime_files = stage_runtime_files(&layout.runtime_dir, staging)?;
        stage_file(&layout.entry_point, staging)?;
        Ok(runtime_files)
    })?;

    clock.run("install", || installer.install(&layout.requirements, staging))?;

    clock.run("config", || {
        synthesize_config_module(&request.config, staging, layout).map(|_| ())
    })?;

    let entries = collect_files_recursive(staging)?;
    clock.run("archive", || archiver.archive(staging, &layout.archive))?;

    // The new archive is in place, so a leftover staging dir no longer fails
    // the run.
    guard.armed = false;
    let cleanup_error = match clock.run("cleanup", || remove_staging(staging)) {
        Ok(()) => None,
        Err(err) => {
            let message = format!("{err:#}");
            tracing::warn!(
                staging = %staging.display(),
                error = %message,
                "archive written but staging dir was left behind"
            );
            Some(message)
        }
    };

    let archive_bytes = fs::metadata(&layout.archive)
        .with_context(|| format!("stat {}", layout.archive.display()))?
        .len();
    tracing::info!(
        archive = %layout.archive.display(),
        archive_bytes,
        entries = entries.len(),
        "bundle complete"
    );

    Ok(BundleReport {
        archive: layout.archive.clone(),
        archive_bytes,
        config_source: request.config.clone(),
        entries,
        runtime_files,
        stages: clock.stages,
        cleanup_error,
    })
}

/// Persist a report as pretty JSON.
pub fn write_report(path: &Path, report: &BundleReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize bundle report")?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
