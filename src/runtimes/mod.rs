mod compiled;
mod entry_point;
mod interpreted;
mod sandboxed;

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::process::{self, ProcessCommand, RunOptions};
use crate::registry::{LanguageDescriptor, Strategy};
use crate::runtime::RunOutcome;

/// Run `code` with the strategy the descriptor was registered with
pub async fn run(
    code: &str,
    descriptor: &LanguageDescriptor,
    config: &EngineConfig,
) -> Result<RunOutcome, EngineError> {
    debug!(language = %descriptor.id, strategy = descriptor.strategy.name(), "Dispatching to strategy");

    match &descriptor.strategy {
        Strategy::Sandboxed => sandboxed::run(code, config.limits.sandbox_timeout()).await,
        Strategy::Interpreted { interpreter } => {
            interpreted::run(code, descriptor, interpreter, config).await
        }
        Strategy::Compiled {
            compiler,
            compile_args,
        } => compiled::run(code, descriptor, compiler, compile_args, config).await,
        Strategy::EntryPoint {
            compiler,
            compile_args,
            runtime,
            run_args,
            entry_pattern,
            entry_description,
        } => {
            let spec = entry_point::EntryPointSpec {
                compiler,
                compile_args,
                runtime,
                run_args,
                entry_pattern,
                entry_description,
            };
            entry_point::run(code, descriptor, spec, config).await
        }
    }
}

/// Run a compile step. Anything the compiler writes to stderr is a compilation
/// error, as is a failed exit that produced diagnostics.
pub(crate) async fn compile(command: &ProcessCommand, options: &RunOptions) -> Result<(), EngineError> {
    match process::run(command, options).await {
        Ok(output) if output.stderr.is_empty() => Ok(()),
        Ok(output) => Err(EngineError::Compilation(output.stderr.trim().to_string())),
        Err(EngineError::ProcessFailed { stderr, .. }) if !stderr.is_empty() => {
            Err(EngineError::Compilation(stderr.trim().to_string()))
        }
        Err(e) => Err(e),
    }
}
