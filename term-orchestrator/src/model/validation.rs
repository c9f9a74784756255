//! Validation records: the durable outcome of one run.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifies one run: wall-clock start plus a random token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunId {
    pub run_time: DateTime<Utc>,
    pub run_name: String,
}

impl RunId {
    /// Wall-clock start time plus a fresh random token.
    pub fn generate() -> Self {
        let mut token = [0u8; 16];
        rand::rng().fill(&mut token);
        Self {
            run_time: Utc::now(),
            run_name: hex::encode(token),
        }
    }
}

/// Run-level metadata. Caller tags are flattened next to the known fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMeta {
    pub run_id: RunId,
    pub datasource_id: String,
    pub dataset_id: String,
    pub dataset_name: String,
    pub validation_time: DateTime<Utc>,
    #[serde(flatten)]
    pub tags: Map<String, Value>,
}

/// The check configuration echoed back with each result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationConfig {
    pub expectation_type: String,
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub raised_exception: bool,
    #[serde(default)]
    pub exception_message: Option<String>,
    #[serde(default)]
    pub exception_traceback: Option<String>,
}

impl ExceptionInfo {
    pub fn raised(message: impl Into<String>) -> Self {
        Self {
            raised_exception: true,
            exception_message: Some(message.into()),
            exception_traceback: None,
        }
    }
}

/// Outcome of a single expectation within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub expectation_id: String,
    pub expectation_config: ExpectationConfig,
    pub success: bool,
    /// Engine metrics; carries `observed_value` or `observed_value_list`.
    #[serde(default)]
    pub result: Map<String, Value>,
    #[serde(default)]
    pub exception_info: ExceptionInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub evaluated_expectations: usize,
    pub successful_expectations: usize,
    pub unsuccessful_expectations: usize,
    /// Absent when nothing was evaluated.
    pub success_percent: Option<f64>,
}

impl Statistics {
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let evaluated = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        let success_percent = if evaluated == 0 {
            None
        } else {
            Some(successful as f64 / evaluated as f64 * 100.0)
        };

        Self {
            evaluated_expectations: evaluated,
            successful_expectations: successful,
            unsuccessful_expectations: evaluated - successful,
            success_percent,
        }
    }
}

/// One executed run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub meta: ValidationMeta,
    pub results: Vec<ValidationResult>,
    pub statistics: Statistics,
    pub success: bool,
}

impl Validation {
    pub fn run_time(&self) -> DateTime<Utc> {
        self.meta.run_id.run_time
    }

    /// True when any result belongs to the given expectation.
    pub fn mentions_expectation(&self, expectation_id: &str) -> bool {
        self.results
            .iter()
            .any(|r| r.expectation_id == expectation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(success: bool) -> ValidationResult {
        ValidationResult {
            expectation_id: "e".into(),
            expectation_config: ExpectationConfig {
                expectation_type: "expect_column_to_exist".into(),
                kwargs: Map::new(),
                meta: Map::new(),
            },
            success,
            result: Map::new(),
            exception_info: ExceptionInfo::default(),
        }
    }

    #[test]
    fn test_statistics_percent() {
        let stats = Statistics::from_results(&[result(true), result(false), result(true), result(true)]);
        assert_eq!(stats.evaluated_expectations, 4);
        assert_eq!(stats.successful_expectations, 3);
        assert_eq!(stats.unsuccessful_expectations, 1);
        assert_eq!(stats.success_percent, Some(75.0));
    }

    #[test]
    fn test_run_id_tokens_are_unique() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_eq!(a.run_name.len(), 32);
        assert_ne!(a.run_name, b.run_name);
    }

    #[test]
    fn test_statistics_empty_has_no_percent() {
        let stats = Statistics::from_results(&[]);
        assert_eq!(stats.success_percent, None);
    }

    #[test]
    fn test_meta_flattens_tags() {
        let now = Utc::now();
        let mut tags = Map::new();
        tags.insert("triggered_by".into(), json!("scheduler"));
        let meta = ValidationMeta {
            run_id: RunId {
                run_time: now,
                run_name: "abc".into(),
            },
            datasource_id: "ds".into(),
            dataset_id: "orders".into(),
            dataset_name: "public.orders".into(),
            validation_time: now,
            tags,
        };

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["triggered_by"], json!("scheduler"));
        assert_eq!(value["run_id"]["run_name"], json!("abc"));
    }
}
