//! # Configuration Management
//!
//! Centralized configuration for the runtime.
//!
//! This module provides structured configuration for the codec and the RPC
//! layer: payload limits, nesting limits, and call timeouts.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment variable overrides via `from_env()`

use crate::error::{Result, SkirError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Max allowed payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Max allowed value nesting depth
pub const MAX_DEPTH: usize = 64;

/// Default timeout for a pending RPC response
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Main runtime configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RuntimeConfig {
    /// Codec-specific configuration
    #[serde(default)]
    pub codec: CodecConfig,

    /// RPC-specific configuration
    #[serde(default)]
    pub rpc: RpcConfig,
}

impl RuntimeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| SkirError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| SkirError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| SkirError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("SKIR_MAX_PAYLOAD_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.codec.max_payload_size = val;
            }
        }

        if let Ok(depth) = std::env::var("SKIR_MAX_DEPTH") {
            if let Ok(val) = depth.parse::<usize>() {
                config.codec.max_depth = val;
            }
        }

        if let Ok(timeout) = std::env::var("SKIR_RESPONSE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.rpc.response_timeout = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.codec.validate());
        errors.extend(self.rpc.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SkirError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Codec-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodecConfig {
    /// Maximum accepted payload size in bytes
    pub max_payload_size: usize,

    /// Maximum value nesting depth accepted by decoders
    pub max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            max_depth: MAX_DEPTH,
        }
    }
}

impl CodecConfig {
    /// Validate codec configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_payload_size
            ));
        }

        if self.max_depth < 4 {
            errors.push("Max depth too small (minimum: 4)".to_string());
        } else if self.max_depth > 1024 {
            errors.push(format!(
                "Max depth too large: {} (maximum: 1024)",
                self.max_depth
            ));
        }

        errors
    }
}

/// RPC-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcConfig {
    /// Timeout for waiting for a method response
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            response_timeout: RESPONSE_TIMEOUT,
        }
    }
}

impl RpcConfig {
    /// Validate RPC configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.response_timeout.as_millis() < 10 {
            errors.push("Response timeout too short (minimum: 10ms)".to_string());
        } else if self.response_timeout.as_secs() > 300 {
            errors.push("Response timeout too long (maximum: 300s)".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_empty());
        assert!(config.validate_strict().is_ok());
        assert_eq!(config.codec.max_payload_size, MAX_PAYLOAD_SIZE);
        assert_eq!(config.codec.max_depth, MAX_DEPTH);
        assert_eq!(config.rpc.response_timeout, RESPONSE_TIMEOUT);
    }

    #[test]
    fn toml_roundtrip() {
        let config = RuntimeConfig::default_with_overrides(|c| {
            c.codec.max_depth = 16;
            c.rpc.response_timeout = Duration::from_millis(1500);
        });
        let toml = toml::to_string_pretty(&config).expect("serialize");
        let parsed = RuntimeConfig::from_toml(&toml).expect("parse");
        assert_eq!(parsed.codec.max_depth, 16);
        assert_eq!(parsed.rpc.response_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed = RuntimeConfig::from_toml("[codec]\nmax_depth = 8\nmax_payload_size = 1024\n")
            .expect("parse");
        assert_eq!(parsed.codec.max_depth, 8);
        assert_eq!(parsed.rpc.response_timeout, RESPONSE_TIMEOUT);
    }

    #[test]
    fn invalid_values_flagged() {
        let config = RuntimeConfig::default_with_overrides(|c| {
            c.codec.max_payload_size = 0;
            c.codec.max_depth = 1;
            c.rpc.response_timeout = Duration::from_millis(1);
        });
        let errors = config.validate();
        assert_eq!(errors.len(), 3);
        assert!(matches!(
            config.validate_strict(),
            Err(SkirError::ConfigError(_))
        ));
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            RuntimeConfig::from_toml("codec = not-a-table"),
            Err(SkirError::ConfigError(_))
        ));
        assert!(RuntimeConfig::from_file("/nonexistent/skir.toml").is_err());
    }

    #[test]
    fn env_vars_override_defaults() {
        std::env::set_var("SKIR_MAX_PAYLOAD_SIZE", "1024");
        std::env::set_var("SKIR_MAX_DEPTH", "8");
        std::env::set_var("SKIR_RESPONSE_TIMEOUT_MS", "1500");

        let config = RuntimeConfig::from_env().expect("load");

        std::env::remove_var("SKIR_MAX_PAYLOAD_SIZE");
        std::env::remove_var("SKIR_MAX_DEPTH");
        std::env::remove_var("SKIR_RESPONSE_TIMEOUT_MS");

        assert_eq!(config.codec.max_payload_size, 1024);
        assert_eq!(config.codec.max_depth, 8);
        assert_eq!(config.rpc.response_timeout, Duration::from_millis(1500));

        // Unparseable values fall back to defaults.
        std::env::set_var("SKIR_MAX_DEPTH", "not-a-number");
        let fallback = RuntimeConfig::from_env().expect("load");
        std::env::remove_var("SKIR_MAX_DEPTH");
        assert_eq!(fallback.codec.max_depth, MAX_DEPTH);
    }

    #[test]
    fn example_config_parses() {
        let example = RuntimeConfig::example_config();
        assert!(RuntimeConfig::from_toml(&example).is_ok());
    }
}
