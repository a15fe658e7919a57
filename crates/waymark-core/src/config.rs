//! Engine configuration.
//!
//! All knobs have defaults, so an empty JSON object is a valid config file.
//! Hosts load the file with [`EngineConfig::load`] (or
//! [`EngineConfig::load_default`] for the XDG location) and then apply their
//! own overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt, WaymarkError};

/// Default number of silent auto-retries for a transient step failure.
pub const MAX_TRANSIENT_STEP_RETRIES: u32 = 3;

/// Per-step auto-retry policy used by the retry controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Auto-retries allowed before a transient failure is escalated
    pub max_transient_step_retries: u32,
    /// Delay before the first auto-retry
    pub base_delay_ms: u64,
    /// Added to the delay for every further auto-retry
    pub delay_increment_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transient_step_retries: MAX_TRANSIENT_STEP_RETRIES,
            base_delay_ms: 1000,
            delay_increment_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before auto-retry number `attempt` (1-based).
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use waymark_core::config::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
    /// assert_eq!(policy.delay_for(3), Duration::from_millis(3000));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let extra = self
            .delay_increment_ms
            .saturating_mul(u64::from(attempt.saturating_sub(1)));
        Duration::from_millis(self.base_delay_ms.saturating_add(extra))
    }
}

/// Retry and timeout policy for the generation resilience layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPolicy {
    /// Retries of the same credential after "service unavailable"
    pub max_unavailable_retries: u32,
    /// Fixed delay between those retries
    pub unavailable_delay_ms: u64,
    /// Upper bound on a single request including its streamed body
    pub request_timeout_secs: u64,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            max_unavailable_retries: 3,
            unavailable_delay_ms: 2000,
            request_timeout_secs: 120,
        }
    }
}

impl GenerationPolicy {
    pub fn unavailable_delay(&self) -> Duration {
        Duration::from_millis(self.unavailable_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Limits for the bounded-concurrency task pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPoolConfig {
    pub max_workers: usize,
    pub task_timeout_secs: u64,
    /// Extra attempts after a failed or timed-out task
    pub task_retries: u32,
}

impl Default for TaskPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout_secs: 120,
            task_retries: 1,
        }
    }
}

impl TaskPoolConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model identifier passed to the generation service
    pub model: String,
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// Credentials in rotation order. Usually supplied via the environment
    /// rather than the file.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<String>,
    pub retry: RetryPolicy,
    pub generation: GenerationPolicy,
    pub pool: TaskPoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_keys: Vec::new(),
            retry: RetryPolicy::default(),
            generation: GenerationPolicy::default(),
            pool: TaskPoolConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns `WaymarkError::FileSystem` if the file cannot be read and
    /// `WaymarkError::Configuration` if it is not a valid config.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| WaymarkError::FileSystem {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&text)
            .with_context(format!("Invalid config file {}", path.display()))
    }

    /// Reads `$XDG_CONFIG_HOME/waymark/config.json`, falling back to
    /// defaults when it does not exist.
    pub fn load_default() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// The XDG config file path, if the file exists.
    pub fn default_config_path() -> Option<PathBuf> {
        xdg::BaseDirectories::with_prefix("waymark").find_config_file("config.json")
    }

    /// Appends comma-separated keys (as found in `WAYMARK_API_KEYS`),
    /// skipping blanks and duplicates.
    pub fn add_api_keys(&mut self, keys: &str) {
        for key in keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            if !self.api_keys.iter().any(|existing| existing == key) {
                self.api_keys.push(key.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.retry.max_transient_step_retries, 3);
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "retry": { "base_delay_ms": 5 }, "model": "m" }"#).unwrap();
        assert_eq!(config.model, "m");
        assert_eq!(config.retry.base_delay_ms, 5);
        assert_eq!(config.retry.delay_increment_ms, 1000);
        assert_eq!(config.generation, GenerationPolicy::default());
    }

    #[test]
    fn test_load_reports_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let error = EngineConfig::load(&path).expect_err("Invalid JSON should fail");
        assert!(matches!(error, WaymarkError::Configuration { .. }));

        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            EngineConfig::load(&missing),
            Err(WaymarkError::FileSystem { .. })
        ));
    }

    #[test]
    fn test_add_api_keys_dedupes() {
        let mut config = EngineConfig::default();
        config.add_api_keys("k1, k2,,k1");
        config.add_api_keys("k3");
        assert_eq!(config.api_keys, vec!["k1", "k2", "k3"]);
    }
}
