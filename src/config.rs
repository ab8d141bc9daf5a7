use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::workspace::DEFAULT_PREFIX;

/// Wall-clock bounds for each execution phase, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// In-process evaluation budget
    pub sandbox_timeout_ms: u64,
    /// Direct interpretation budget
    pub interpret_timeout_ms: u64,
    /// Compile phase budget
    pub compile_timeout_ms: u64,
    /// Run phase budget for compiled programs
    pub run_timeout_ms: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            sandbox_timeout_ms: 5_000,
            interpret_timeout_ms: 10_000,
            compile_timeout_ms: 10_000,
            run_timeout_ms: 10_000,
        }
    }
}

impl ExecutionLimits {
    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_millis(self.sandbox_timeout_ms)
    }

    pub fn interpret_timeout(&self) -> Duration {
        Duration::from_millis(self.interpret_timeout_ms)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

/// Binary overrides for a registered language
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageOverride {
    /// Interpreter binary for interpreted languages
    pub interpreter: Option<String>,
    /// Compiler binary for compiled languages
    pub compiler: Option<String>,
    /// Runtime binary for entry-point languages
    pub runtime: Option<String>,
}

/// Configuration for the execution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory under which per-invocation workspaces are created
    pub temp_root: PathBuf,

    /// Name prefix for workspace directories
    pub workspace_prefix: String,

    pub limits: ExecutionLimits,

    /// Longest accepted source text, in characters
    pub max_code_length: usize,

    /// Log verbosity used when RUST_LOG is unset
    pub log_level: String,

    /// Per-language binary overrides, keyed by language identifier
    pub languages: HashMap<String, LanguageOverride>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir(),
            workspace_prefix: DEFAULT_PREFIX.to_string(),
            limits: ExecutionLimits::default(),
            max_code_length: 10_000,
            log_level: "info".to_string(),
            languages: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults when it does not exist
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: EngineConfig = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let config_str = toml::to_string(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, config_str)
            .with_context(|| format!("Failed to write config to file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the default config path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("rusty-executor").join("config.toml")
        } else {
            PathBuf::from("./config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.limits.sandbox_timeout(), Duration::from_secs(5));
        assert_eq!(config.limits.interpret_timeout(), Duration::from_secs(10));
        assert_eq!(config.limits.compile_timeout(), Duration::from_secs(10));
        assert_eq!(config.limits.run_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_code_length, 10_000);
        assert_eq!(config.workspace_prefix, "code-exec-");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            log_level = "debug"

            [limits]
            run_timeout_ms = 2500

            [languages.python]
            interpreter = "/usr/local/bin/python3.12"
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.limits.run_timeout_ms, 2500);
        assert_eq!(config.limits.compile_timeout_ms, 10_000);
        assert_eq!(
            config.languages.get("python").unwrap().interpreter.as_deref(),
            Some("/usr/local/bin/python3.12")
        );
        assert!(config.languages.get("ruby").is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = EngineConfig::default();
        config.limits.sandbox_timeout_ms = 750;
        config.languages.insert(
            "c".to_string(),
            LanguageOverride {
                compiler: Some("clang".to_string()),
                ..Default::default()
            },
        );
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "limits = 5").unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }
}
