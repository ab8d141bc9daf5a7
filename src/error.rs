use std::time::Duration;
use thiserror::Error;

use crate::runtime::ErrorKind;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Language '{language}' is not supported. Supported languages: {}", supported.join(", "))]
    UnsupportedLanguage {
        language: String,
        supported: Vec<String>,
    },

    #[error("Code cannot be empty")]
    EmptyCode,

    #[error("Compilation Error: {0}")]
    Compilation(String),

    #[error("No {entry} found. {language} code must contain a {entry}.")]
    EntryPointNotFound { language: String, entry: String },

    #[error("{command} timed out after {}ms", limit.as_millis())]
    Timeout { command: String, limit: Duration },

    #[error("Failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {command}\n{}", stderr.trim())]
    ProcessFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Workspace error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Execution task failed: {0}")]
    Join(String),

    #[error("{0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Join(err.to_string())
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnsupportedLanguage { .. } => ErrorKind::UnsupportedLanguage,
            EngineError::EmptyCode => ErrorKind::InvalidRequest,
            EngineError::Compilation(_) => ErrorKind::CompilationError,
            EngineError::EntryPointNotFound { .. } => ErrorKind::EntryPointNotFound,
            EngineError::Timeout { .. } => ErrorKind::Timeout,
            EngineError::Spawn { .. } | EngineError::ProcessFailed { .. } => {
                ErrorKind::ProcessError
            }
            EngineError::Io(_) | EngineError::Join(_) | EngineError::Internal(_) => {
                ErrorKind::InternalExecutionError
            }
        }
    }
}
