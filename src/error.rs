//! Typed failures of the external tools the pipeline delegates to.

use thiserror::Error;

/// Failure of a delegated program (installer or archiver).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// The configured command line was empty or could not be split.
    #[error("{tool} command is invalid: {reason}")]
    InvalidCommand { tool: &'static str, reason: String },

    /// The program could not be found on PATH.
    #[error("{tool} program not found: {program}")]
    NotFound { tool: &'static str, program: String },

    /// The program ran and exited unsuccessfully.
    #[error("{tool} failed with status {}: {stderr}", status_label(.code))]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },
}

fn status_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

impl ToolError {
    /// Process exit code to surface for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ToolError::Failed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ToolError;

    #[test]
    fn failed_tool_surfaces_its_exit_code() {
        let err = ToolError::Failed {
            tool: "installer",
            code: Some(3),
            stderr: "no matching distribution".to_string(),
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.to_string(),
            "installer failed with status 3: no matching distribution"
        );
    }

    #[test]
    fn signal_and_lookup_failures_map_to_one() {
        let killed = ToolError::Failed {
            tool: "archiver",
            code: None,
            stderr: String::new(),
        };
        assert_eq!(killed.exit_code(), 1);
        assert!(killed.to_string().contains("status signal"));

        let missing = ToolError::NotFound {
            tool: "archiver",
            program: "zip".to_string(),
        };
        assert_eq!(missing.exit_code(), 1);
    }
}
