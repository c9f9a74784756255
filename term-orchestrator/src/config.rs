//! Runtime configuration for the orchestrator and its components.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::logging::LogConfig;

/// Result format requested from the engine for each check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultFormat {
    /// Only the success flag.
    BooleanOnly,
    /// Success flag plus observed value and counts.
    Basic,
    /// Basic plus a partial list of unexpected values.
    #[default]
    Summary,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::BooleanOnly => "BOOLEAN_ONLY",
            ResultFormat::Basic => "BASIC",
            ResultFormat::Summary => "SUMMARY",
        }
    }

    /// Parses a stored `result_format` value, accepting the object form
    /// `{"result_format": "SUMMARY"}` as well as a bare string.
    pub fn from_kwarg(value: &serde_json::Value) -> Option<Self> {
        let raw = match value {
            serde_json::Value::String(s) => s.as_str(),
            serde_json::Value::Object(map) => map.get("result_format")?.as_str()?,
            _ => return None,
        };
        match raw.to_ascii_uppercase().as_str() {
            "BOOLEAN_ONLY" => Some(ResultFormat::BooleanOnly),
            "BASIC" => Some(ResultFormat::Basic),
            "SUMMARY" | "COMPLETE" => Some(ResultFormat::Summary),
            _ => None,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Configuration for validation runs and previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound for each engine call and each dispatch call
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Whether the engine may evaluate checks concurrently
    pub allow_engine_concurrency: bool,
    /// Number of rows returned by a dataset preview
    pub preview_rows: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            allow_engine_concurrency: true,
            preview_rows: 10,
        }
    }
}

impl ExecutorConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_engine_concurrency(mut self, allow: bool) -> Self {
        self.allow_engine_concurrency = allow;
        self
    }

    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }
}

/// Configuration for sample profiling and expectation suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Maximum number of rows pulled into the profiling sample
    pub sample_rows: usize,
    /// A column with at most this many distinct values gets an in-set suggestion
    pub value_set_threshold: usize,
    /// Result format written into every suggested expectation
    pub result_format: ResultFormat,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            sample_rows: 10_000,
            value_set_threshold: 10,
            result_format: ResultFormat::Summary,
        }
    }
}

impl ProfilerConfig {
    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }

    pub fn with_value_set_threshold(mut self, threshold: usize) -> Self {
        self.value_set_threshold = threshold;
        self
    }
}

/// Configuration for success-rate rollups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Length of the trailing window covered by the daily histogram
    pub histogram_days: u32,
    /// Maximum number of validation records read per computation
    pub query_limit: usize,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            histogram_days: 31,
            query_limit: 10_000,
        }
    }
}

/// Configuration for the queued dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of notifications that may wait for delivery
    pub capacity: usize,
    /// Upper bound for delivering one notification
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DispatchConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Top-level configuration handed to [`crate::orchestrator::Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub executor: ExecutorConfig,
    pub profiler: ProfilerConfig,
    pub statistics: StatisticsConfig,
    pub log: LogConfig,
    /// Deadline for each repository call made by the orchestrator.
    pub store_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            profiler: ProfilerConfig::default(),
            statistics: StatisticsConfig::default(),
            log: LogConfig::default(),
            store_timeout: Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    /// Single-threaded engine evaluation, short timeout and verbose logging.
    pub fn development() -> Self {
        Self {
            executor: ExecutorConfig::default()
                .with_timeout(Duration::from_secs(30))
                .with_engine_concurrency(false),
            log: LogConfig::verbose(),
            ..Default::default()
        }
    }

    /// Defaults with production logging.
    pub fn production() -> Self {
        Self {
            log: LogConfig::production(),
            ..Default::default()
        }
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_profiler(mut self, profiler: ProfilerConfig) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_statistics(mut self, statistics: StatisticsConfig) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}
