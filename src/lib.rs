//! A multi-language code execution engine.
//!
//! [`ExecutionEngine::execute`] takes source text and a language identifier
//! and returns captured output, a structured error (if any) and the elapsed
//! time. Languages run in one of four ways, fixed per language when the
//! [`LanguageRegistry`] is built: in-process JavaScript evaluation, direct
//! interpretation, compile-then-run, or compile-then-run with the file named
//! after an entry symbol found in the source. File-based runs get a private
//! temporary workspace that is always removed afterwards.
//!
//! There is no admission control: callers that need bounded concurrency put
//! their own queue or semaphore in front of the engine.

pub mod config;
pub mod engine;
pub mod error;
pub mod process;
pub mod registry;
pub mod request;
pub mod runtime;
pub mod runtimes;
pub mod telemetry;
pub mod workspace;

pub use config::{EngineConfig, ExecutionLimits, LanguageOverride};
pub use engine::ExecutionEngine;
pub use error::EngineError;
pub use registry::{LanguageDescriptor, LanguageRegistry, Strategy};
pub use request::{ExecutionRequest, ExecutionResponse, LanguagesResponse, RequestError};
pub use runtime::{ErrorKind, ExecutionError, ExecutionResult};
