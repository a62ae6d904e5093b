//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;

/// Log levels accepted in `logging.level`.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Server identity settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Directories the file-scanning tools may read.
    #[serde(default)]
    pub allowed_paths: Vec<PathBuf>,

    /// Tool selection settings.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        if self.tools.disabled.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: "tools.disabled must not contain empty names".to_string(),
            });
        }

        if let Some(name) = &self.server.name {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "server.name must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Returns the allowed paths, defaulting to the working directory.
    #[must_use]
    pub fn effective_allowed_paths(&self) -> Vec<PathBuf> {
        if self.allowed_paths.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.allowed_paths.clone()
        }
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Name advertised to clients instead of the package name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Tool selection configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Built-in tools that should not be registered.
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl ToolsConfig {
    /// Returns `true` unless `name` is listed in `disabled`.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.iter().any(|d| d == name)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
