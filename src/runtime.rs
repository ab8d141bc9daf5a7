use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;
use crate::process::ProcessOutput;

/// Classification attached to every error surfaced in an [`ExecutionResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The language identifier is not in the registry
    UnsupportedLanguage,
    /// The request was rejected before reaching any strategy
    InvalidRequest,
    /// The compiler reported diagnostics; nothing was run
    CompilationError,
    /// The source lacks the declaration its entry point is derived from
    EntryPointNotFound,
    /// A compile, run or evaluation phase exceeded its bound
    Timeout,
    /// A subprocess could not be started, or exited non-zero without stdout
    ProcessError,
    /// The program reported an error but still produced a result
    RuntimeError,
    /// Any other fault raised inside a strategy
    InternalExecutionError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedLanguage => "UnsupportedLanguage",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::CompilationError => "CompilationError",
            ErrorKind::EntryPointNotFound => "EntryPointNotFound",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::ProcessError => "ProcessError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::InternalExecutionError => "InternalExecutionError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried by an [`ExecutionResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    /// Kind name, or the script-level error name for evaluated code
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: kind.as_str().to_string(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack;
        self
    }
}

impl From<&EngineError> for ExecutionError {
    fn from(err: &EngineError) -> Self {
        ExecutionError::new(err.kind(), err.to_string())
    }
}

/// What a strategy hands back to the dispatcher: captured output plus any soft error
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub output: String,
    pub error: Option<ExecutionError>,
}

impl RunOutcome {
    /// Stdout becomes the output; anything on stderr is reported as a soft error
    pub fn from_process(process: &ProcessOutput) -> Self {
        let stderr = process.stderr.trim();
        Self {
            output: process.stdout.trim().to_string(),
            error: if stderr.is_empty() {
                None
            } else {
                Some(ExecutionError::new(ErrorKind::RuntimeError, stderr))
            },
        }
    }

    pub fn failed(error: ExecutionError) -> Self {
        Self {
            output: String::new(),
            error: Some(error),
        }
    }
}

/// The envelope returned for every invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub output: String,
    pub error: Option<ExecutionError>,
    /// Wall-clock time of the whole invocation in milliseconds
    pub execution_time: u64,
}

impl ExecutionResult {
    pub fn from_outcome(outcome: RunOutcome, execution_time: u64) -> Self {
        Self {
            output: outcome.output,
            error: outcome.error,
            execution_time,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_output_without_stderr_is_clean() {
        let process = ProcessOutput {
            stdout: "hello\n".to_string(),
            stderr: "  \n".to_string(),
            exit_code: Some(0),
        };
        let outcome = RunOutcome::from_process(&process);
        assert_eq!(outcome.output, "hello");
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_process_stderr_becomes_soft_error() {
        let process = ProcessOutput {
            stdout: "partial\n".to_string(),
            stderr: "warning: deprecated\n".to_string(),
            exit_code: Some(1),
        };
        let outcome = RunOutcome::from_process(&process);
        assert_eq!(outcome.output, "partial");
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, ErrorKind::RuntimeError);
        assert_eq!(error.message, "warning: deprecated");
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ExecutionResult {
            output: "2".to_string(),
            error: None,
            execution_time: 3,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["executionTime"], 3);
        assert!(json["error"].is_null());

        let failed = ExecutionResult::from_outcome(
            RunOutcome::failed(ExecutionError::new(ErrorKind::Timeout, "too slow")),
            10,
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"]["kind"], "Timeout");
        assert_eq!(json["error"]["name"], "Timeout");
        assert!(json["error"].get("stack").is_none());
    }
}
