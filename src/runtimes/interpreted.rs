use tracing::info;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::process::{self, ProcessCommand, RunOptions};
use crate::registry::LanguageDescriptor;
use crate::runtime::RunOutcome;
use crate::workspace::{with_workspace, write_file};

/// Write the source to `main.<ext>` and hand it to `interpreter`
pub async fn run(
    code: &str,
    descriptor: &LanguageDescriptor,
    interpreter: &str,
    config: &EngineConfig,
) -> Result<RunOutcome, EngineError> {
    let file_name = descriptor.main_file_name();
    let timeout = config.limits.interpret_timeout();

    with_workspace(&config.temp_root, &config.workspace_prefix, |dir| async move {
        let source = write_file(&dir, &file_name, code).await?;
        info!(language = %descriptor.id, interpreter, "Interpreting {}", file_name);

        let command = ProcessCommand::new(interpreter).arg(&source);
        let output = process::run(&command, &RunOptions::new(timeout, &dir)).await?;
        Ok(RunOutcome::from_process(&output))
    })
    .await
}
