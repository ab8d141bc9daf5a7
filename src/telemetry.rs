use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::runtime::ErrorKind;

/// Number of recent executions kept for inspection
const RECENT_EXECUTIONS: usize = 100;

/// Counter key shared by every request for an unregistered language
pub const UNSUPPORTED_LANGUAGE: &str = "unsupported";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("TelemetryManager not initialized")]
    NotInitialized,
}

/// One finished invocation
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEvent {
    pub language: String,
    pub execution_time_ms: u64,
    pub error_kind: Option<ErrorKind>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Point-in-time copy of the collected counters
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub service_name: String,
    pub taken_at: chrono::DateTime<chrono::Utc>,
    pub execution_count: u64,
    pub error_count: u64,
    pub timeout_count: u64,
    pub executions_by_language: BTreeMap<String, u64>,
    pub errors_by_kind: BTreeMap<String, u64>,
    pub average_execution_time_ms: f64,
    pub recent: Vec<ExecutionEvent>,
}

#[derive(Debug, Default)]
struct Counters {
    execution_count: u64,
    error_count: u64,
    timeout_count: u64,
    total_execution_time_ms: u64,
    executions_by_language: BTreeMap<String, u64>,
    errors_by_kind: BTreeMap<String, u64>,
    recent: VecDeque<ExecutionEvent>,
}

lazy_static! {
    static ref TELEMETRY_MANAGER: Mutex<Option<TelemetryManager>> = Mutex::new(None);
}

/// Process-wide execution counters. Only observes; never affects results.
#[derive(Debug, Clone)]
pub struct TelemetryManager {
    service_name: String,
    counters: Arc<Mutex<Counters>>,
}

impl TelemetryManager {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            counters: Arc::new(Mutex::new(Counters::default())),
        }
    }

    /// Initialize the global manager; later calls are no-ops
    pub fn init(service_name: &str) {
        let Ok(mut manager) = TELEMETRY_MANAGER.lock() else {
            return;
        };
        if manager.is_some() {
            return;
        }
        info!("Initializing telemetry for {}", service_name);
        *manager = Some(TelemetryManager::new(service_name));
    }

    /// Get a handle to the global manager
    pub fn global() -> Result<TelemetryManager, TelemetryError> {
        TELEMETRY_MANAGER
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().cloned())
            .ok_or(TelemetryError::NotInitialized)
    }

    /// Drop the global manager
    pub fn shutdown() {
        if let Ok(mut manager) = TELEMETRY_MANAGER.lock() {
            manager.take();
        }
    }

    /// Record a finished invocation
    pub fn record_execution(&self, language: &str, execution_time_ms: u64, error_kind: Option<ErrorKind>) {
        let Ok(mut counters) = self.counters.lock() else {
            return;
        };

        counters.execution_count += 1;
        counters.total_execution_time_ms += execution_time_ms;
        *counters
            .executions_by_language
            .entry(language.to_string())
            .or_insert(0) += 1;

        if let Some(kind) = error_kind {
            counters.error_count += 1;
            *counters.errors_by_kind.entry(kind.to_string()).or_insert(0) += 1;
            if kind == ErrorKind::Timeout {
                counters.timeout_count += 1;
            }
        }

        if counters.recent.len() == RECENT_EXECUTIONS {
            counters.recent.pop_front();
        }
        counters.recent.push_back(ExecutionEvent {
            language: language.to_string(),
            execution_time_ms,
            error_kind,
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        let average_execution_time_ms = if counters.execution_count == 0 {
            0.0
        } else {
            counters.total_execution_time_ms as f64 / counters.execution_count as f64
        };

        TelemetrySnapshot {
            service_name: self.service_name.clone(),
            taken_at: chrono::Utc::now(),
            execution_count: counters.execution_count,
            error_count: counters.error_count,
            timeout_count: counters.timeout_count,
            executions_by_language: counters.executions_by_language.clone(),
            errors_by_kind: counters.errors_by_kind.clone(),
            average_execution_time_ms,
            recent: counters.recent.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_executions_and_errors() {
        let telemetry = TelemetryManager::new("test");
        telemetry.record_execution("python", 10, None);
        telemetry.record_execution("python", 30, Some(ErrorKind::Timeout));
        telemetry.record_execution("c", 20, Some(ErrorKind::CompilationError));

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.execution_count, 3);
        assert_eq!(snapshot.error_count, 2);
        assert_eq!(snapshot.timeout_count, 1);
        assert_eq!(snapshot.executions_by_language["python"], 2);
        assert_eq!(snapshot.errors_by_kind["CompilationError"], 1);
        assert!((snapshot.average_execution_time_ms - 20.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.recent.len(), 3);
    }

    #[test]
    fn test_recent_is_bounded() {
        let telemetry = TelemetryManager::new("test");
        for i in 0..(RECENT_EXECUTIONS as u64 + 5) {
            telemetry.record_execution("ruby", i, None);
        }
        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.recent.len(), RECENT_EXECUTIONS);
        assert_eq!(snapshot.recent[0].execution_time_ms, 5);
    }

    #[test]
    fn test_snapshot_serializes() {
        let telemetry = TelemetryManager::new("test");
        telemetry.record_execution("java", 1, Some(ErrorKind::EntryPointNotFound));
        let json = serde_json::to_value(telemetry.snapshot()).unwrap();
        assert_eq!(json["recent"][0]["error_kind"], "EntryPointNotFound");
    }
}
