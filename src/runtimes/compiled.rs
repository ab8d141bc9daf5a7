use tracing::info;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::process::{self, ProcessCommand, RunOptions};
use crate::registry::{expand_args, LanguageDescriptor, OUTPUT_PLACEHOLDER, SOURCE_PLACEHOLDER};
use crate::runtime::RunOutcome;
use crate::runtimes::compile;
use crate::workspace::{with_workspace, write_file};

/// Name of the executable produced in the workspace
pub const EXECUTABLE_NAME: &str = "main";

/// Compile `main.<ext>` into `main`, then run it
pub async fn run(
    code: &str,
    descriptor: &LanguageDescriptor,
    compiler: &str,
    compile_args: &[String],
    config: &EngineConfig,
) -> Result<RunOutcome, EngineError> {
    let file_name = descriptor.main_file_name();
    let limits = &config.limits;

    with_workspace(&config.temp_root, &config.workspace_prefix, |dir| async move {
        let source = write_file(&dir, &file_name, code).await?;
        let executable = dir.join(EXECUTABLE_NAME);

        let source_arg = source.to_string_lossy();
        let executable_arg = executable.to_string_lossy();
        let args = expand_args(
            compile_args,
            &[
                (OUTPUT_PLACEHOLDER, executable_arg.as_ref()),
                (SOURCE_PLACEHOLDER, source_arg.as_ref()),
            ],
        );

        info!(language = %descriptor.id, compiler, "Compiling {}", file_name);
        compile(
            &ProcessCommand::new(compiler).args(args),
            &RunOptions::new(limits.compile_timeout(), &dir),
        )
        .await?;

        let output = process::run(
            &ProcessCommand::new(&executable),
            &RunOptions::new(limits.run_timeout(), &dir),
        )
        .await?;
        Ok(RunOutcome::from_process(&output))
    })
    .await
}
