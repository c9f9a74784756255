//! Runs compiled suites and normalizes engine outcomes into validation records.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::batch::BatchDescriptor;
use crate::config::ExecutorConfig;
use crate::connection;
use crate::dispatch::{ActionDispatcher, ActionNotification};
use crate::engine::{EngineError, EngineResult, ExecutionEngine, ExecutionOptions, RawOutcome, SampleData};
use crate::error::{Result, TermError};
use crate::expectations;
use crate::logging::{truncate_field, LogConfig};
use crate::model::{
    Dataset, DatasetAddress, Datasource, RunId, Statistics, Validation, ValidationMeta,
    ValidationResult,
};
use crate::suite::{CompiledSuite, EXPECTATION_ID};

/// Meta keys owned by the executor; caller tags cannot override them.
const RESERVED_META_KEYS: &[&str] = &[
    "run_id",
    "datasource_id",
    "dataset_id",
    "dataset_name",
    "validation_time",
];

/// Outcome of a dataset preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleResponse {
    Data(SampleData),
    /// The batch could not be read; the message is safe to show to users.
    Exception { exception: String },
}

impl SampleResponse {
    pub fn exception(message: impl Into<String>) -> Self {
        Self::Exception {
            exception: message.into(),
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception { .. })
    }
}

/// Executes compiled suites against an engine and dispatches the outcome.
#[derive(Clone)]
pub struct ValidationExecutor {
    engine: Arc<dyn ExecutionEngine>,
    dispatcher: Arc<dyn ActionDispatcher>,
    config: ExecutorConfig,
    log: LogConfig,
}

impl ValidationExecutor {
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        dispatcher: Arc<dyn ActionDispatcher>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            config,
            log: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs `suite` against `dataset` and returns the finalized record.
    ///
    /// Dispatch happens exactly once after the record is built; a dispatch
    /// failure is logged and the record is still returned. Engine failures
    /// (syntax, missing table, timeout) are returned as errors and no record
    /// is produced.
    #[instrument(skip_all, fields(
        dataset_id = %dataset.key,
        datasource_id = %datasource.key,
        checks = suite.len()
    ))]
    pub async fn run(
        &self,
        datasource: &Datasource,
        dataset: &Dataset,
        suite: &CompiledSuite,
        tags: Map<String, Value>,
    ) -> Result<Validation> {
        let connection = connection::resolve(datasource, dataset)?;
        let batch = BatchDescriptor::for_dataset(dataset, false)?;
        let run_id = RunId::generate();

        crate::log_engine_op!(
            self.log,
            run_name = %run_id.run_name,
            batch = %truncate_field(batch_label(&batch), self.log.max_field_length),
            "Executing suite"
        );

        let options = ExecutionOptions {
            allow_concurrency: self.config.allow_engine_concurrency,
        };
        let outcomes = self
            .bounded(
                "execute",
                self.engine.execute(&connection, &batch, suite, options),
            )
            .await?;

        if outcomes.len() != suite.len() {
            return Err(TermError::Internal(format!(
                "engine returned {} outcomes for {} checks",
                outcomes.len(),
                suite.len()
            )));
        }

        let results = outcomes
            .into_iter()
            .map(normalize_outcome)
            .collect::<Result<Vec<_>>>()?;

        for result in &results {
            crate::log_check!(
                self.log,
                expectation_id = %result.expectation_id,
                expectation_type = %result.expectation_config.expectation_type,
                success = result.success,
                "Check evaluated"
            );
        }

        let statistics = Statistics::from_results(&results);
        let success = results.iter().all(|r| r.success);
        let validation = Validation {
            meta: ValidationMeta {
                run_id,
                datasource_id: datasource.key.clone(),
                dataset_id: dataset.key.clone(),
                dataset_name: dataset.dataset_name.clone(),
                validation_time: Utc::now(),
                tags: strip_reserved(tags),
            },
            results,
            statistics,
            success,
        };

        info!(
            run_name = %validation.meta.run_id.run_name,
            success,
            evaluated = statistics.evaluated_expectations,
            success_percent = ?statistics.success_percent,
            "Validation finished"
        );

        self.dispatch(&dataset.key, &validation).await;
        Ok(validation)
    }

    /// Returns the first `row_limit` rows of `dataset` or a user-facing
    /// exception message when the batch cannot be read.
    #[instrument(skip_all, fields(dataset = %dataset.dataset_name, row_limit = row_limit))]
    pub async fn sample(
        &self,
        datasource: &Datasource,
        dataset: &Dataset,
        row_limit: usize,
    ) -> Result<SampleResponse> {
        self.sample_batch(datasource, dataset, row_limit, false)
            .await
    }

    /// Like [`ValidationExecutor::sample`], optionally materializing a
    /// query-addressed batch first.
    pub(crate) async fn sample_batch(
        &self,
        datasource: &Datasource,
        dataset: &Dataset,
        row_limit: usize,
        materialize: bool,
    ) -> Result<SampleResponse> {
        let connection = connection::resolve(datasource, dataset)?;
        let batch = BatchDescriptor::for_dataset(dataset, materialize)?;

        crate::log_engine_op!(
            self.log,
            batch = %truncate_field(batch_label(&batch), self.log.max_field_length),
            "Sampling batch"
        );

        let outcome = self
            .bounded(
                "sample",
                self.engine.sample(&connection, &batch, row_limit),
            )
            .await;

        match outcome {
            Ok(data) => Ok(SampleResponse::Data(data)),
            Err(TermError::Engine(err)) => {
                let message = match &err {
                    EngineError::SyntaxError { .. } | EngineError::NotFound { .. } => {
                        Some(match dataset.address()? {
                            DatasetAddress::Query { .. } => "Syntax error in query.".to_string(),
                            DatasetAddress::Table { name } => format!("{name} is not recognized."),
                        })
                    }
                    EngineError::Timeout { seconds, .. } => {
                        Some(format!("Timed out after {seconds}s."))
                    }
                    EngineError::Connection { .. } | EngineError::Execution { .. } => None,
                };

                match message {
                    Some(message) => {
                        warn!(error = %err, exception = %message, "Sample failed");
                        Ok(SampleResponse::exception(message))
                    }
                    None => Err(TermError::Engine(err)),
                }
            }
            Err(other) => Err(other),
        }
    }

    /// Bounds an engine call by the configured timeout.
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = EngineResult<T>>,
    {
        bounded_by(self.config.timeout, operation, call).await
    }

    async fn dispatch(&self, dataset_id: &str, validation: &Validation) {
        let notification = ActionNotification::validation(dataset_id, validation.clone());
        match tokio::time::timeout(self.config.timeout, self.dispatcher.dispatch(notification)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(dataset_id, error = %e, "Dispatch failed"),
            Err(_) => warn!(
                dataset_id,
                timeout_secs = self.config.timeout.as_secs(),
                "Dispatch timed out"
            ),
        }
    }
}

async fn bounded_by<T, F>(timeout: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = EngineResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(TermError::from),
        Err(_) => Err(EngineError::timeout(operation, timeout).into()),
    }
}

fn batch_label(batch: &BatchDescriptor) -> &str {
    match batch {
        BatchDescriptor::AdHoc { query, .. } => query,
        BatchDescriptor::NamedTable { table, .. } => table,
    }
}

fn strip_reserved(mut tags: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_META_KEYS {
        if tags.remove(*key).is_some() {
            warn!(key, "Ignoring caller tag that shadows run metadata");
        }
    }
    tags
}

/// Converts an engine outcome into the stored result shape.
///
/// Engine kwargs are renamed back to their stored names, a list-valued
/// `observed_value` moves to `observed_value_list`, and the
/// `expectation_id` is lifted out of the per-check metadata.
pub fn normalize_outcome(outcome: RawOutcome) -> Result<ValidationResult> {
    let RawOutcome {
        mut expectation_config,
        success,
        mut result,
        exception_info,
    } = outcome;

    expectation_config.kwargs = expectations::to_public(&expectation_config.kwargs);

    if matches!(result.get("observed_value"), Some(Value::Array(_))) {
        if let Some(list) = result.remove("observed_value") {
            result.insert("observed_value_list".to_string(), list);
        }
    }

    let expectation_id = match expectation_config.meta.remove(EXPECTATION_ID) {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => {
            return Err(TermError::MissingExpectationId {
                expectation_type: expectation_config.expectation_type,
            })
        }
    };

    Ok(ValidationResult {
        expectation_id,
        expectation_config,
        success,
        result,
        exception_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExceptionInfo, ExpectationConfig};
    use serde_json::json;

    fn outcome(meta: Value, kwargs: Value, result: Value) -> RawOutcome {
        RawOutcome {
            expectation_config: ExpectationConfig {
                expectation_type: "expect_column_values_to_not_be_null".into(),
                kwargs: kwargs.as_object().unwrap().clone(),
                meta: meta.as_object().unwrap().clone(),
            },
            success: true,
            result: result.as_object().unwrap().clone(),
            exception_info: ExceptionInfo::default(),
        }
    }

    #[test]
    fn test_normalize_renames_and_promotes() {
        let normalized = normalize_outcome(outcome(
            json!({"expectation_id": "e-1", "dataset_name": "orders"}),
            json!({"column": "id", "mostly": 0.9}),
            json!({"observed_value": [1, 2]}),
        ))
        .unwrap();

        assert_eq!(normalized.expectation_id, "e-1");
        assert!(!normalized.expectation_config.meta.contains_key("expectation_id"));
        assert_eq!(normalized.expectation_config.kwargs["objective"], json!(0.9));
        assert!(!normalized.expectation_config.kwargs.contains_key("mostly"));
        assert_eq!(normalized.result["observed_value_list"], json!([1, 2]));
        assert!(!normalized.result.contains_key("observed_value"));
    }

    #[test]
    fn test_scalar_observed_value_stays() {
        let normalized = normalize_outcome(outcome(
            json!({"expectation_id": "e-1"}),
            json!({"column": "amount"}),
            json!({"observed_value": 12.5}),
        ))
        .unwrap();
        assert_eq!(normalized.result["observed_value"], json!(12.5));
    }

    #[test]
    fn test_missing_expectation_id() {
        let err = normalize_outcome(outcome(json!({}), json!({}), json!({}))).unwrap_err();
        assert!(matches!(err, TermError::MissingExpectationId { .. }));
    }

    #[test]
    fn test_reserved_tags_are_dropped() {
        let mut tags = Map::new();
        tags.insert("dataset_id".into(), json!("spoofed"));
        tags.insert("trigger".into(), json!("manual"));
        let tags = strip_reserved(tags);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags["trigger"], json!("manual"));
    }

    #[test]
    fn test_sample_response_shapes() {
        let exception = SampleResponse::exception("Syntax error in query.");
        assert_eq!(
            serde_json::to_value(&exception).unwrap(),
            json!({"exception": "Syntax error in query."})
        );

        let data = SampleResponse::Data(SampleData {
            columns: vec!["id".into()],
            rows: vec![],
        });
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({"columns": ["id"], "rows": []})
        );
    }

    #[tokio::test]
    async fn test_bounded_call_times_out() {
        let err = bounded_by(Duration::from_millis(10), "execute", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, EngineError>(())
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            TermError::Engine(EngineError::Timeout { .. })
        ));
        assert!(err.is_retryable());
    }
}
