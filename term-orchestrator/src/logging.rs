//! Logging utilities and configuration for the orchestrator.
//!
//! The orchestrator logs through `tracing`. [`LogConfig`] decides how much
//! per-check and per-engine detail is emitted, and [`setup`] installs a
//! `tracing-subscriber` pipeline for binaries that do not bring their own.

use tracing::Level;

/// Logging configuration for orchestration runs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for orchestrator components; becomes the
    /// `term_orchestrator` directive of [`setup::LoggingConfig::from_log_config`]
    pub base_level: Level,
    /// Whether to log each compiled check and its outcome
    pub log_check_details: bool,
    /// Whether to log engine calls (sampling, execution)
    pub log_engine_operations: bool,
    /// Maximum length for logged field values such as ad-hoc queries
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_check_details: false,
            log_engine_operations: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_check_details: true,
            log_engine_operations: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_check_details: false,
            log_engine_operations: false,
            max_field_length: 128,
        }
    }

    /// Creates a balanced configuration suitable for most use cases.
    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Macro for conditional per-check logging.
#[macro_export]
macro_rules! log_check {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_check_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional engine operation logging.
#[macro_export]
macro_rules! log_engine_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_engine_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    match value.char_indices().nth(max_length) {
        None => value.to_string(),
        Some((cut, _)) => format!("{}...(truncated)", &value[..cut]),
    }
}

/// Utilities for installing a `tracing-subscriber` pipeline.
pub mod setup {
    use tracing::Level;

    use super::LogConfig;

    /// Configuration for the global subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for orchestrator components specifically
        pub orchestrator_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                orchestrator_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                orchestrator_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                orchestrator_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Filter settings matching an orchestrator [`LogConfig`]: its
        /// `base_level` applies to orchestrator components.
        pub fn from_log_config(log: &LogConfig) -> Self {
            Self::default().with_orchestrator_level(log.base_level)
        }

        /// Sets the log level for the application.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the log level for orchestrator components.
        pub fn with_orchestrator_level(mut self, level: Level) -> Self {
            self.orchestrator_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},term_orchestrator={}",
                    self.level.as_str().to_lowercase(),
                    self.orchestrator_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs the global subscriber. `RUST_LOG` takes precedence over the config.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_orchestrator::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::production()).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.base_level, Level::INFO);
        assert!(!config.log_check_details);
        assert!(config.log_engine_operations);
        assert_eq!(config.max_field_length, 256);
    }

    #[test]
    fn test_log_config_production() {
        let config = LogConfig::production();
        assert_eq!(config.base_level, Level::WARN);
        assert!(!config.log_check_details);
        assert!(!config.log_engine_operations);
        assert_eq!(config.max_field_length, 128);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("select * from orders where id > 10", 10),
            "select * f...(truncated)"
        );
        // multi-byte characters are never split
        assert_eq!(truncate_field("ééééé", 2), "éé...(truncated)");
    }

    #[test]
    fn test_env_filter_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.env_filter(), "info,term_orchestrator=debug");

        let custom = LoggingConfig::default().with_env_filter("warn");
        assert_eq!(custom.env_filter(), "warn");
    }

    #[test]
    fn test_filter_follows_log_config_level() {
        let quiet = LoggingConfig::from_log_config(&LogConfig::production());
        assert_eq!(quiet.env_filter(), "info,term_orchestrator=warn");

        let verbose = LoggingConfig::from_log_config(&LogConfig::verbose());
        assert_eq!(verbose.env_filter(), "info,term_orchestrator=debug");
    }
}
