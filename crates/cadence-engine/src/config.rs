//! Engine configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! max_retries = 3
//! retry_delay_ms = 250
//! redact_keys = ["password", "ssn"]
//!
//! [aliases]
//! live_server = "http_request"
//! ```

use crate::error::EngineError;
use cadence_registry::{CapabilityRegistry, RegistryBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Retries after a retryable dispatch failure (steps may override)
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub retry_delay_ms: u64,
    /// Per-attempt dispatch timeout (steps may override)
    pub step_timeout_ms: u64,
    /// Budget on the time a session spends being driven
    pub session_timeout_secs: u64,
    /// How many recent history entries loop detection inspects
    pub loop_window: usize,
    /// Steps a single run may execute before escalating
    pub max_steps_per_run: usize,
    /// Context keys masked in external status views (case-insensitive substring)
    pub redact_keys: Vec<String>,
    /// Extra `alias → capability` entries added to the built-in table
    pub aliases: BTreeMap<String, String>,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With retry budget
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// With delay between attempts
    #[inline]
    #[must_use]
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// With per-attempt dispatch timeout
    #[inline]
    #[must_use]
    pub fn with_step_timeout_ms(mut self, ms: u64) -> Self {
        self.step_timeout_ms = ms;
        self
    }

    /// With session busy-time budget
    #[inline]
    #[must_use]
    pub fn with_session_timeout_secs(mut self, secs: u64) -> Self {
        self.session_timeout_secs = secs;
        self
    }

    /// With loop-detection window
    #[inline]
    #[must_use]
    pub fn with_loop_window(mut self, window: usize) -> Self {
        self.loop_window = window;
        self
    }

    /// With per-run step budget
    #[inline]
    #[must_use]
    pub fn with_max_steps_per_run(mut self, steps: usize) -> Self {
        self.max_steps_per_run = steps;
        self
    }

    /// With redacted context keys (replaces the defaults)
    #[must_use]
    pub fn with_redact_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redact_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// With one extra alias
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    /// Delay between attempts
    #[inline]
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Default per-attempt timeout
    #[inline]
    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Session busy-time budget
    #[inline]
    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// `EngineError::Config` for invalid TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// IO or parse failure.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// `EngineError::Config` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Built-in registry plus the configured aliases
    ///
    /// # Errors
    /// `EngineError::Registry` when an alias targets an unknown capability
    /// or shadows a canonical id.
    pub fn build_registry(&self) -> Result<CapabilityRegistry, EngineError> {
        let registry = RegistryBuilder::with_defaults()
            .aliases(self.aliases.iter().map(|(a, t)| (a.clone(), t.clone())))
            .build()?;
        Ok(registry)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 100,
            step_timeout_ms: 30_000,
            session_timeout_secs: 300,
            loop_window: 16,
            max_steps_per_run: 1_000,
            redact_keys: ["password", "token", "api_key", "secret"]
                .into_iter()
                .map(String::from)
                .collect(),
            aliases: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
max_retries = 5
loop_window = 4

[aliases]
live_server = "http_request"
"#,
        )
        .unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.loop_window, 4);
        assert_eq!(config.retry_delay_ms, 100);
        assert_eq!(config.aliases.get("live_server").map(String::as_str), Some("http_request"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("max_retry = 1").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn toml_round_trip() {
        let config = EngineConfig::new()
            .with_max_retries(0)
            .with_alias("ping", "echo");
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn aliases_extend_registry() {
        let registry = EngineConfig::new()
            .with_alias("Live Server", "http_request")
            .build_registry()
            .unwrap();
        assert_eq!(
            registry.canonicalize("live server").unwrap().capability.as_str(),
            "http_request"
        );
        assert!(registry.contains("echo"));
    }

    #[test]
    fn bad_alias_is_an_error() {
        let err = EngineConfig::new()
            .with_alias("teleport", "beam_me_up")
            .build_registry()
            .unwrap_err();
        assert!(matches!(err, EngineError::Registry(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.toml");
        std::fs::write(&path, "step_timeout_ms = 50\n").unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.step_timeout(), Duration::from_millis(50));
        assert!(matches!(
            EngineConfig::from_file(&dir.path().join("missing.toml")),
            Err(EngineError::Io { .. })
        ));
    }
}
