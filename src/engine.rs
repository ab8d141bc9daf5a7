use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::registry::LanguageRegistry;
use crate::request::ExecutionRequest;
use crate::runtime::{ExecutionError, ExecutionResult, RunOutcome};
use crate::runtimes;
use crate::telemetry::{TelemetryManager, UNSUPPORTED_LANGUAGE};

/// Public entry point: resolves the language, runs its strategy and always
/// returns a result envelope. Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    registry: Arc<LanguageRegistry>,
    config: Arc<EngineConfig>,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ExecutionEngine {
    /// Build the registry from `config` once; it is never modified afterwards
    pub fn new(config: EngineConfig) -> Self {
        let registry = LanguageRegistry::from_config(&config);
        Self::with_registry(registry, config)
    }

    pub fn with_registry(registry: LanguageRegistry, config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }

    pub fn supported_languages(&self) -> Vec<String> {
        self.registry.supported_languages()
    }

    /// Execute `code` as `language`. Every failure is reported inside the
    /// returned envelope; this never panics or errors.
    #[instrument(skip(self, code), fields(code_len = code.len()))]
    pub async fn execute(&self, code: &str, language: &str) -> ExecutionResult {
        let start = Instant::now();
        let language = language.to_lowercase();

        let Some(descriptor) = self.registry.resolve(&language) else {
            let err = EngineError::UnsupportedLanguage {
                language: language.clone(),
                supported: self.supported_languages(),
            };
            let outcome = RunOutcome::failed(ExecutionError::from(&err));
            return self.finish(&language, UNSUPPORTED_LANGUAGE, outcome, 0);
        };

        if code.is_empty() {
            let err = EngineError::EmptyCode;
            let outcome = RunOutcome::failed(ExecutionError::from(&err));
            return self.finish(&language, &descriptor.id, outcome, 0);
        }

        // Run on its own task so a panicking strategy is contained.
        let task_code = code.to_string();
        let task_config = Arc::clone(&self.config);
        let task_descriptor = Arc::clone(&descriptor);
        let handle = tokio::spawn(async move {
            runtimes::run(&task_code, &task_descriptor, &task_config).await
        });

        let outcome = match handle.await.map_err(EngineError::from) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) | Err(err) => {
                warn!(kind = %err.kind(), "Execution failed: {}", err);
                RunOutcome::failed(ExecutionError::from(&err))
            }
        };

        let execution_time = start.elapsed().as_millis() as u64;
        self.finish(&language, &descriptor.id, outcome, execution_time)
    }

    /// Execute a request that already passed caller-side validation
    pub async fn execute_request(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.execute(request.code(), request.language()).await
    }

    /// Log and record a finished invocation. Telemetry is keyed by `telemetry_key`,
    /// a registered id or [`UNSUPPORTED_LANGUAGE`], never by raw caller input.
    fn finish(
        &self,
        language: &str,
        telemetry_key: &str,
        outcome: RunOutcome,
        execution_time: u64,
    ) -> ExecutionResult {
        let result = ExecutionResult::from_outcome(outcome, execution_time);
        let error_kind = result.error_kind();

        info!(
            language,
            execution_time_ms = execution_time,
            error = ?error_kind,
            "Execution finished"
        );

        if let Ok(telemetry) = TelemetryManager::global() {
            telemetry.record_execution(telemetry_key, execution_time, error_kind);
        }

        result
    }
}
