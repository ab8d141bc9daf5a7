use regex::Regex;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::process::{self, ProcessCommand, RunOptions};
use crate::registry::{expand_args, LanguageDescriptor, ENTRY_PLACEHOLDER, SOURCE_PLACEHOLDER};
use crate::runtime::RunOutcome;
use crate::runtimes::compile;
use crate::workspace::{with_workspace, write_file};

/// Recover the entry symbol from the first match of `pattern`
pub fn discover_entry(code: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(code)
        .and_then(|captures| captures.get(1))
        .map(|symbol| symbol.as_str().to_string())
}

pub struct EntryPointSpec<'a> {
    pub compiler: &'a str,
    pub compile_args: &'a [String],
    pub runtime: &'a str,
    pub run_args: &'a [String],
    pub entry_pattern: &'a Regex,
    pub entry_description: &'a str,
}

/// Write `<Entry>.<ext>`, compile it, then ask the runtime to execute `<Entry>`.
/// No workspace is created when the entry symbol cannot be found.
pub async fn run(
    code: &str,
    descriptor: &LanguageDescriptor,
    spec: EntryPointSpec<'_>,
    config: &EngineConfig,
) -> Result<RunOutcome, EngineError> {
    let entry = discover_entry(code, spec.entry_pattern).ok_or_else(|| {
        EngineError::EntryPointNotFound {
            language: descriptor.id.clone(),
            entry: spec.entry_description.to_string(),
        }
    })?;
    debug!(language = %descriptor.id, entry = %entry, "Entry point discovered");

    let file_name = format!("{}.{}", entry, descriptor.extension);
    let limits = &config.limits;

    with_workspace(&config.temp_root, &config.workspace_prefix, |dir| async move {
        let source = write_file(&dir, &file_name, code).await?;
        let source_arg = source.to_string_lossy();
        let replacements = [
            (SOURCE_PLACEHOLDER, source_arg.as_ref()),
            (ENTRY_PLACEHOLDER, entry.as_str()),
        ];

        info!(language = %descriptor.id, compiler = spec.compiler, "Compiling {}", file_name);
        compile(
            &ProcessCommand::new(spec.compiler).args(expand_args(spec.compile_args, &replacements)),
            &RunOptions::new(limits.compile_timeout(), &dir),
        )
        .await?;

        let output = process::run(
            &ProcessCommand::new(spec.runtime).args(expand_args(spec.run_args, &replacements)),
            &RunOptions::new(limits.run_timeout(), &dir),
        )
        .await?;
        Ok(RunOutcome::from_process(&output))
    })
    .await
}
