//! Invocation of delegated command-line tools.
//!
//! Tool commands are user-configurable strings (e.g. `python3 -m pip`), split
//! with shell-words and resolved on PATH before the pipeline touches disk.
use crate::error::ToolError;
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// A resolved external program plus its leading arguments.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    tool: &'static str,
    program: PathBuf,
    base_args: Vec<String>,
}

impl ToolCommand {
    /// Split `command` and resolve its program on PATH.
    pub fn parse(tool: &'static str, command: &str) -> Result<Self, ToolError> {
        let mut argv = shell_words::split(command).map_err(|err| ToolError::InvalidCommand {
            tool,
            reason: err.to_string(),
        })?;
        if argv.is_empty() {
            return Err(ToolError::InvalidCommand {
                tool,
                reason: "command is empty".to_string(),
            });
        }
        let name = argv.remove(0);
        let program = which::which(&name).map_err(|_| ToolError::NotFound {
            tool,
            program: name.clone(),
        })?;
        Ok(Self {
            tool,
            program,
            base_args: argv,
        })
    }

    /// Run the tool with extra arguments, failing on a non-zero exit.
    ///
    /// Stdout is discarded; stderr is captured into the error on failure.
    pub fn run<I>(&self, args: I, cwd: Option<&Path>) -> Result<()>
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut command = Command::new(&self.program);
        command.args(&self.base_args).args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        tracing::debug!(tool = self.tool, program = %self.program.display(), "spawn tool");
        let start = Instant::now();
        let output = command
            .output()
            .with_context(|| format!("spawn {} command: {}", self.tool, self.program.display()))?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            tool = self.tool,
            elapsed_ms,
            status = ?output.status.code(),
            "tool invoke complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::Failed {
                tool: self.tool,
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}
