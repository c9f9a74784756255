//! Repositories the orchestrator reads records from and writes runs to.
//!
//! The document store itself is out of scope; these traits describe the
//! read-by-id and filtered queries the orchestrator needs, so any backend
//! can sit behind them. [`InMemoryStore`] implements all of them for tests
//! and embedded use.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Dataset, Datasource, Expectation, Sample, Validation};

pub mod in_memory;
pub mod query;

pub use in_memory::InMemoryStore;
pub use query::{
    SortOrder, ValidationFilter, ValidationQuery, DEFAULT_PERIOD_DAYS, DEFAULT_QUERY_LIMIT,
};

/// Read access to datasource records.
#[async_trait]
pub trait DatasourceStore: Send + Sync {
    /// Fails with `NotFound` for an unknown key and `UnknownEngine` when the
    /// stored engine tag is not recognised.
    async fn get_datasource(&self, key: &str) -> Result<Datasource>;
}

/// Dataset records.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn get_dataset(&self, key: &str) -> Result<Dataset>;

    /// Replaces the stored preview of a dataset and bumps `modified_date`.
    async fn update_sample(&self, key: &str, sample: Sample) -> Result<()>;
}

/// Filter for expectation lookups. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectationFilter {
    pub dataset_id: Option<String>,
    pub datasource_id: Option<String>,
    pub enabled: Option<bool>,
}

impl ExpectationFilter {
    /// Enabled expectations of one dataset: the set a run evaluates.
    pub fn enabled_for_dataset(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: Some(dataset_id.into()),
            enabled: Some(true),
            ..Self::default()
        }
    }

    pub fn matches(&self, expectation: &Expectation) -> bool {
        self.dataset_id
            .as_deref()
            .map_or(true, |id| expectation.dataset_id == id)
            && self
                .datasource_id
                .as_deref()
                .map_or(true, |id| expectation.datasource_id == id)
            && self.enabled.map_or(true, |enabled| expectation.enabled == enabled)
    }
}

/// Expectation records.
#[async_trait]
pub trait ExpectationStore: Send + Sync {
    /// Matching records in creation order.
    async fn query_expectations(&self, filter: &ExpectationFilter) -> Result<Vec<Expectation>>;
}

/// Append-only validation history.
#[async_trait]
pub trait ValidationStore: Send + Sync {
    /// Stores a finished run and returns its key.
    async fn save_validation(&self, validation: Validation) -> Result<String>;

    async fn query_validations(&self, query: &ValidationQuery) -> Result<Vec<Validation>>;

    /// Deletes every run matching `filter` and returns how many were removed.
    /// An empty filter is rejected rather than wiping the history.
    async fn delete_validations(&self, filter: &ValidationFilter) -> Result<usize>;
}
