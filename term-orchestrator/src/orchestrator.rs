//! Entry points used by API handlers and the scheduler.
//!
//! An [`Orchestrator`] wires the stores, the execution engine and the
//! dispatcher together. Each operation loads the records it needs by id,
//! delegates to the executor, profiler or statistics aggregator and, for
//! runs, persists the finished record.
//!
//! # Example
//!
//! ```rust,ignore
//! use term_orchestrator::prelude::*;
//!
//! let store = InMemoryStore::new();
//! let engine = Arc::new(DataFusionEngine::new());
//! let orchestrator = Orchestrator::new(
//!     Stores::in_memory(store.clone()),
//!     engine,
//!     Arc::new(NoopDispatcher),
//!     OrchestratorConfig::default(),
//! );
//!
//! let validation = orchestrator
//!     .run_dataset_validation(&dataset_id, Map::new())
//!     .await?;
//! println!("success: {}", validation.success);
//! ```

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::OrchestratorConfig;
use crate::dispatch::ActionDispatcher;
use crate::engine::ExecutionEngine;
use crate::error::{Result, TermError};
use crate::executor::{SampleResponse, ValidationExecutor};
use crate::expectations::{supported_unsupported_expectations, SupportedExpectations};
use crate::model::{Dataset, Datasource, Expectation, Sample, Validation};
use crate::profiler::{default_exclusions, Profiler, SuggestionEngine};
use crate::statistics::{DatasetStatistics, StatisticsAggregator};
use crate::store::{
    DatasetStore, DatasourceStore, ExpectationFilter, ExpectationStore, InMemoryStore,
    ValidationFilter, ValidationQuery, ValidationStore,
};
use crate::suite;

/// The repositories an orchestrator reads from and writes to.
#[derive(Clone)]
pub struct Stores {
    pub datasources: Arc<dyn DatasourceStore>,
    pub datasets: Arc<dyn DatasetStore>,
    pub expectations: Arc<dyn ExpectationStore>,
    pub validations: Arc<dyn ValidationStore>,
}

impl Stores {
    /// Every repository backed by the same in-memory store.
    pub fn in_memory(store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            datasources: store.clone(),
            datasets: store.clone(),
            expectations: store.clone(),
            validations: store,
        }
    }
}

pub struct Orchestrator {
    stores: Stores,
    executor: ValidationExecutor,
    profiler: Profiler,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        stores: Stores,
        engine: Arc<dyn ExecutionEngine>,
        dispatcher: Arc<dyn ActionDispatcher>,
        config: OrchestratorConfig,
    ) -> Self {
        let executor = ValidationExecutor::new(engine, dispatcher, config.executor.clone())
            .with_log_config(config.log.clone());
        let profiler = Profiler::new(executor.clone(), config.profiler.clone());

        Self {
            stores,
            executor,
            profiler,
            config,
        }
    }

    /// Replaces the rules used by [`Orchestrator::suggest_expectations`].
    pub fn with_suggestion_engine(mut self, engine: SuggestionEngine) -> Self {
        self.profiler = self.profiler.with_suggestion_engine(engine);
        self
    }

    pub fn executor(&self) -> &ValidationExecutor {
        &self.executor
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs a repository call under `store_timeout`.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let limit = self.config.store_timeout;
        tokio::time::timeout(limit, call).await.map_err(|_| {
            warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Repository call timed out"
            );
            TermError::timeout(operation, limit)
        })?
    }

    async fn load_dataset(&self, dataset_id: &str) -> Result<(Dataset, Datasource)> {
        let dataset = self
            .bounded("get_dataset", self.stores.datasets.get_dataset(dataset_id))
            .await?;
        let datasource = self
            .bounded(
                "get_datasource",
                self.stores.datasources.get_datasource(&dataset.datasource_id),
            )
            .await?;
        Ok((dataset, datasource))
    }

    /// Runs every enabled expectation of a dataset and stores the result.
    ///
    /// `tags` are caller identifiers merged into the run metadata. Engine
    /// failures (syntax, missing table, timeout) are returned as errors and
    /// nothing is stored.
    #[instrument(skip(self, tags), fields(tags = tags.len()))]
    pub async fn run_dataset_validation(
        &self,
        dataset_id: &str,
        tags: Map<String, Value>,
    ) -> Result<Validation> {
        let (dataset, datasource) = self.load_dataset(dataset_id).await?;
        let filter = ExpectationFilter::enabled_for_dataset(dataset_id);
        let records = self
            .bounded(
                "query_expectations",
                self.stores.expectations.query_expectations(&filter),
            )
            .await?;
        if records.is_empty() {
            warn!("Dataset has no enabled expectations");
        }

        let template = suite::meta_template(&datasource, &dataset);
        let compiled = suite::compile_suite(&records, &template, &dataset)?;
        let validation = self
            .executor
            .run(&datasource, &dataset, &compiled, tags)
            .await?;

        let key = self
            .bounded(
                "save_validation",
                self.stores.validations.save_validation(validation.clone()),
            )
            .await?;
        info!(validation_key = %key, success = validation.success, "Stored validation");
        Ok(validation)
    }

    /// Preview rows of a dataset, or a user-facing exception message.
    #[instrument(skip(self))]
    pub async fn sample_dataset(&self, dataset_id: &str) -> Result<SampleResponse> {
        let (dataset, datasource) = self.load_dataset(dataset_id).await?;
        self.executor
            .sample(&datasource, &dataset, self.config.executor.preview_rows)
            .await
    }

    /// Samples a dataset and stores the preview on the dataset record.
    ///
    /// An exception response is returned unchanged and leaves the stored
    /// preview untouched.
    #[instrument(skip(self))]
    pub async fn refresh_sample(&self, dataset_id: &str) -> Result<SampleResponse> {
        let response = self.sample_dataset(dataset_id).await?;

        if let SampleResponse::Data(data) = &response {
            let sample = Sample {
                columns: data.columns.clone(),
                rows: serde_json::to_string(&data.rows)?,
            };
            self.bounded(
                "update_sample",
                self.stores.datasets.update_sample(dataset_id, sample),
            )
            .await?;
            info!(rows = data.rows.len(), "Stored dataset sample");
        }

        Ok(response)
    }

    /// Candidate expectations for a dataset, excluding every type the
    /// registry cannot run and per-value range checks.
    pub async fn suggest_expectations(&self, dataset_id: &str) -> Result<Vec<Expectation>> {
        self.suggest_expectations_excluding(dataset_id, &default_exclusions())
            .await
    }

    #[instrument(skip(self, excluded), fields(excluded = excluded.len()))]
    pub async fn suggest_expectations_excluding(
        &self,
        dataset_id: &str,
        excluded: &HashSet<String>,
    ) -> Result<Vec<Expectation>> {
        let (dataset, datasource) = self.load_dataset(dataset_id).await?;
        self.profiler.suggest(&datasource, &dataset, excluded).await
    }

    pub async fn dataset_statistics(&self, dataset_id: &str) -> Result<DatasetStatistics> {
        self.dataset_statistics_at(dataset_id, Utc::now()).await
    }

    /// Success-rate rollups relative to `now`.
    pub async fn dataset_statistics_at(
        &self,
        dataset_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DatasetStatistics> {
        let aggregator = StatisticsAggregator::new(
            self.stores.validations.as_ref(),
            self.config.statistics.clone(),
        );
        self.bounded("query_validations", aggregator.compute_at(dataset_id, now))
            .await
    }

    /// Recent runs matching `query`.
    pub async fn validations(&self, query: &ValidationQuery) -> Result<Vec<Validation>> {
        self.bounded(
            "query_validations",
            self.stores.validations.query_validations(query),
        )
        .await
    }

    /// Deletes stored runs, e.g. after a dataset or expectation is removed.
    #[instrument(skip(self))]
    pub async fn delete_validations(&self, filter: &ValidationFilter) -> Result<usize> {
        let deleted = self
            .bounded(
                "delete_validations",
                self.stores.validations.delete_validations(filter),
            )
            .await?;
        info!(deleted, "Deleted validations");
        Ok(deleted)
    }

    /// Checks a record before it is stored: registered type, well-formed
    /// kwargs, existing dataset and datasource, and a datasource that
    /// matches the dataset's.
    #[instrument(skip_all, fields(expectation_type = %record.expectation_type))]
    pub async fn validate_expectation(&self, record: &Expectation) -> Result<()> {
        suite::compile_expectation(record, Map::new())?;

        let dataset = self
            .bounded(
                "get_dataset",
                self.stores.datasets.get_dataset(&record.dataset_id),
            )
            .await?;
        self.bounded(
            "get_datasource",
            self.stores.datasources.get_datasource(&record.datasource_id),
        )
        .await?;

        if record.datasource_id != dataset.datasource_id {
            return Err(TermError::DatasourceMismatch {
                expectation: record.datasource_id.clone(),
                dataset: dataset.datasource_id,
            });
        }
        Ok(())
    }

    /// Validates each record independently; one result per record, in order.
    pub async fn validate_expectations(&self, records: &[Expectation]) -> Vec<Result<()>> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.validate_expectation(record).await);
        }
        results
    }

    pub fn supported_expectations(&self) -> SupportedExpectations {
        supported_unsupported_expectations()
    }
}
