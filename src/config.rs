//! Configuration for patternworks components.
//!
//! Every section is optional in the TOML source and falls back to its
//! `Default`. Validation runs after parsing so a file that deserializes but
//! describes an unusable queue is rejected up front.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, PatternResult};

/// Complete patternworks configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternworksConfig {
    /// `[flyweight]` section.
    #[serde(default)]
    pub flyweight: FlyweightConfig,
    /// `[queue]` section.
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Flyweight factory configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlyweightConfig {
    /// Shared states created eagerly when the factory is built.
    #[serde(default)]
    pub seed: Vec<Vec<String>>,
}

/// What happens to pending tasks when a queue is torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Cancel every pending task, then join the worker.
    #[default]
    CancelPending,
    /// Run every pending task at its ready time, then join the worker.
    Drain,
}

/// Delayed task queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Queue name, used for the worker thread name and in errors.
    #[serde(default = "default_queue_name")]
    pub name: String,
    /// What happens to pending tasks on teardown.
    #[serde(default)]
    pub shutdown: ShutdownMode,
}

fn default_queue_name() -> String {
    "patternworks-queue".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            shutdown: ShutdownMode::default(),
        }
    }
}

impl QueueConfig {
    /// Create a config with the given queue name and default shutdown mode.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style shutdown mode override.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownMode) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Check that the config describes a usable queue.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "queue.name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl PatternworksConfig {
    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> PatternResult<Self> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> PatternResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::from)?;
        Self::from_toml_str(&contents)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()
    }
}
