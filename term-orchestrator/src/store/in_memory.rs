//! In-memory implementation of every store trait, for tests and embedded use.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{Result, TermError};
use crate::model::{Dataset, Datasource, Expectation, Sample, Validation};

use super::{
    DatasetStore, DatasourceStore, ExpectationFilter, ExpectationStore, ValidationFilter,
    ValidationQuery, ValidationStore,
};

#[derive(Default)]
struct Collections {
    /// Raw documents; parsed on read so a bad engine tag surfaces on use.
    datasources: HashMap<String, Value>,
    datasets: HashMap<String, Dataset>,
    /// Kept in insertion order.
    expectations: Vec<Expectation>,
    validations: Vec<(String, Validation)>,
}

/// Shared in-memory store. Clones share the same collections.
///
/// # Example
///
/// ```rust,ignore
/// let store = InMemoryStore::new();
/// store.insert_datasource("ds-1", json!({"engine": "PostgreSQL", ...})).await;
/// let dataset_id = store.insert_dataset(Dataset::table("ds-1", "public.orders")).await;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a datasource document under `key`, replacing any previous one.
    pub async fn insert_datasource(&self, key: impl Into<String>, document: Value) {
        self.inner
            .write()
            .await
            .datasources
            .insert(key.into(), document);
    }

    /// Stores a dataset and returns its key, generating one when unset.
    pub async fn insert_dataset(&self, mut dataset: Dataset) -> String {
        if dataset.key.is_empty() {
            dataset.key = generate_key();
        }
        let key = dataset.key.clone();
        self.inner.write().await.datasets.insert(key.clone(), dataset);
        key
    }

    /// Stores an expectation and returns its key, generating one when unset.
    pub async fn insert_expectation(&self, mut expectation: Expectation) -> String {
        let key = expectation.key.clone().unwrap_or_else(generate_key);
        expectation.key = Some(key.clone());
        if expectation.create_date.is_none() {
            let now = Utc::now();
            expectation.create_date = Some(now);
            expectation.modified_date = Some(now);
        }

        let mut inner = self.inner.write().await;
        inner
            .expectations
            .retain(|e| e.key.as_deref() != Some(key.as_str()));
        inner.expectations.push(expectation);
        key
    }

    pub async fn validation_count(&self) -> usize {
        self.inner.read().await.validations.len()
    }
}

fn generate_key() -> String {
    let mut bytes = [0u8; 10];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl DatasourceStore for InMemoryStore {
    #[instrument(skip(self), fields(store = "in_memory"))]
    async fn get_datasource(&self, key: &str) -> Result<Datasource> {
        let inner = self.inner.read().await;
        let document = inner
            .datasources
            .get(key)
            .ok_or_else(|| TermError::not_found("datasource", key))?;
        Datasource::from_document(key, document)
    }
}

#[async_trait]
impl DatasetStore for InMemoryStore {
    #[instrument(skip(self), fields(store = "in_memory"))]
    async fn get_dataset(&self, key: &str) -> Result<Dataset> {
        self.inner
            .read()
            .await
            .datasets
            .get(key)
            .cloned()
            .ok_or_else(|| TermError::not_found("dataset", key))
    }

    #[instrument(skip(self, sample), fields(store = "in_memory", columns = sample.columns.len()))]
    async fn update_sample(&self, key: &str, sample: Sample) -> Result<()> {
        let mut inner = self.inner.write().await;
        let dataset = inner
            .datasets
            .get_mut(key)
            .ok_or_else(|| TermError::not_found("dataset", key))?;
        dataset.sample = Some(sample);
        dataset.modified_date = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl ExpectationStore for InMemoryStore {
    #[instrument(skip(self), fields(store = "in_memory"))]
    async fn query_expectations(&self, filter: &ExpectationFilter) -> Result<Vec<Expectation>> {
        Ok(self
            .inner
            .read()
            .await
            .expectations
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ValidationStore for InMemoryStore {
    #[instrument(skip(self, validation), fields(store = "in_memory", dataset_id = %validation.meta.dataset_id))]
    async fn save_validation(&self, validation: Validation) -> Result<String> {
        let key = generate_key();
        self.inner
            .write()
            .await
            .validations
            .push((key.clone(), validation));
        debug!(%key, "Saved validation");
        Ok(key)
    }

    #[instrument(skip(self), fields(store = "in_memory"))]
    async fn query_validations(&self, query: &ValidationQuery) -> Result<Vec<Validation>> {
        query.validate()?;
        let inner = self.inner.read().await;
        Ok(query.apply(inner.validations.iter().map(|(_, v)| v)))
    }

    #[instrument(skip(self), fields(store = "in_memory"))]
    async fn delete_validations(&self, filter: &ValidationFilter) -> Result<usize> {
        if filter.is_empty() {
            return Err(TermError::repository(
                "delete_validations",
                "refusing to delete with an empty filter",
            ));
        }

        let mut inner = self.inner.write().await;
        let before = inner.validations.len();
        inner.validations.retain(|(_, v)| !filter.matches(v));
        let deleted = before - inner.validations.len();
        debug!(deleted, "Deleted validations");
        Ok(deleted)
    }
}
