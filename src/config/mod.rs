//! Configuration module for Berth
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`BERTH_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use berth::config::BerthConfig;
//!
//! let config = BerthConfig::default();
//! assert_eq!(config.scheduler.max_attempts, 3);
//!
//! let toml = r#"
//! [scheduler]
//! max_attempts = 5
//! "#;
//! let config: BerthConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.scheduler.max_attempts, 5);
//! ```

pub mod error;
pub mod hosts;
pub mod logging;
pub mod scheduler;

pub use error::ConfigError;
pub use hosts::HostsConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use scheduler::SchedulerConfig;

use crate::scheduler::filters::FilterCatalog;
use crate::scheduler::weighers::WeigherCatalog;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the scheduler service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BerthConfig {
    pub scheduler: SchedulerConfig,
    pub hosts: HostsConfig,
    pub logging: LoggingConfig,
}

impl BerthConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are ignored and the current setting is kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(attempts) = std::env::var("BERTH_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.scheduler.max_attempts = n;
            }
        }
        if let Ok(path) = std::env::var("BERTH_HOSTS_FILE") {
            if !path.is_empty() {
                self.hosts.source = Some(path.into());
            }
        }

        if let Ok(level) = std::env::var("BERTH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("BERTH_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// Validate configuration against the built-in filter and weigher catalogs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheduler = &self.scheduler;
        if scheduler.max_attempts < 1 {
            return Err(ConfigError::validation(
                "scheduler.max_attempts",
                "must be >= 1",
            ));
        }
        if scheduler.default_filters.is_empty() {
            return Err(ConfigError::validation(
                "scheduler.default_filters",
                "at least one filter is required",
            ));
        }
        if scheduler.default_weighers.is_empty() {
            return Err(ConfigError::validation(
                "scheduler.default_weighers",
                "at least one weigher is required",
            ));
        }

        let filters = FilterCatalog::builtin().names();
        for (field, list) in [
            ("scheduler.default_filters", &scheduler.default_filters),
            ("scheduler.extend_filters", &scheduler.extend_filters),
            ("scheduler.group_filters", &scheduler.group_filters),
        ] {
            if let Some(unknown) = list.iter().find(|n| !filters.contains(&n.as_str())) {
                return Err(ConfigError::validation(
                    field,
                    format!("unknown filter '{}'", unknown),
                ));
            }
        }

        let weighers = WeigherCatalog::builtin(
            scheduler.capacity_weight_multiplier,
            scheduler.allocated_capacity_weight_multiplier,
        )
        .names();
        if let Some(unknown) = scheduler
            .default_weighers
            .iter()
            .find(|n| !weighers.contains(&n.as_str()))
        {
            return Err(ConfigError::validation(
                "scheduler.default_weighers",
                format!("unknown weigher '{}'", unknown),
            ));
        }

        for (field, value) in [
            (
                "scheduler.capacity_weight_multiplier",
                scheduler.capacity_weight_multiplier,
            ),
            (
                "scheduler.allocated_capacity_weight_multiplier",
                scheduler.allocated_capacity_weight_multiplier,
            ),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::validation(field, "must be a finite number"));
            }
        }

        if self.hosts.refresh_interval_seconds == 0 {
            return Err(ConfigError::validation(
                "hosts.refresh_interval_seconds",
                "must be non-zero",
            ));
        }

        Ok(())
    }
}
