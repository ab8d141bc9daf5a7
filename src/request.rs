//! The caller-side boundary: request validation and the response payloads
//! handed back to the service layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::{ExecutionError, ExecutionResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Code cannot be empty")]
    EmptyCode,

    #[error("Code cannot exceed {limit} characters")]
    CodeTooLong { limit: usize },

    #[error("Language is required")]
    MissingLanguage,
}

/// A validated source/language pair; the language is already lower-case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    code: String,
    language: String,
}

impl ExecutionRequest {
    pub fn new(
        code: impl Into<String>,
        language: &str,
        max_code_length: usize,
    ) -> Result<Self, RequestError> {
        let code = code.into();
        if code.is_empty() {
            return Err(RequestError::EmptyCode);
        }
        if code.chars().count() > max_code_length {
            return Err(RequestError::CodeTooLong {
                limit: max_code_length,
            });
        }
        let language = language.trim();
        if language.is_empty() {
            return Err(RequestError::MissingLanguage);
        }

        Ok(Self {
            code,
            language: language.to_lowercase(),
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

/// Payload returned for an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub success: bool,
    pub language: String,
    pub output: String,
    pub error: Option<ExecutionError>,
    pub execution_time: u64,
}

impl ExecutionResponse {
    pub fn new(language: &str, result: ExecutionResult) -> Self {
        Self {
            success: true,
            language: language.to_lowercase(),
            output: result.output,
            error: result.error,
            execution_time: result.execution_time,
        }
    }
}

/// Payload advertising the registered languages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguagesResponse {
    pub success: bool,
    pub supported_languages: Vec<String>,
}

impl LanguagesResponse {
    pub fn new(supported_languages: Vec<String>) -> Self {
        Self {
            success: true,
            supported_languages,
        }
    }
}
