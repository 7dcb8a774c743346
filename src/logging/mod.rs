//! Tracing subscriber setup
//!
//! Renders a [`LoggingConfig`] into `EnvFilter` directives and installs a
//! pretty or JSON formatter.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build filter directives string from LoggingConfig
///
/// The result has the form `base_level,berth::component1=level1,...`.
///
/// # Examples
///
/// ```
/// use berth::config::LoggingConfig;
/// use berth::logging::build_filter_directives;
///
/// let mut config = LoggingConfig::default();
/// config
///     .component_levels
///     .insert("scheduler".to_string(), "debug".to_string());
///
/// assert_eq!(build_filter_directives(&config), "info,berth::scheduler=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    for (component, level) in &config.component_levels {
        filter_str.push_str(&format!(",berth::{}={}", component, level));
    }

    filter_str
}

/// Initialize tracing based on configuration
///
/// `RUST_LOG` takes precedence over the configured directives.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    // Logs go to stderr; stdout carries decisions.
    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_without_components() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..Default::default()
        };
        assert_eq!(build_filter_directives(&config), "warn");
    }

    #[test]
    fn test_directives_are_sorted_by_component() {
        let mut config = LoggingConfig::default();
        config
            .component_levels
            .insert("scheduler".to_string(), "trace".to_string());
        config
            .component_levels
            .insert("host".to_string(), "debug".to_string());

        assert_eq!(
            build_filter_directives(&config),
            "info,berth::host=debug,berth::scheduler=trace"
        );
    }
}
