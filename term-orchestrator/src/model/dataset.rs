//! Dataset records: a named, queryable unit bound to one datasource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TermError};

/// Parameters of a query-addressed dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeParameters {
    pub query: String,
    #[serde(
        rename = "schema",
        alias = "schema_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_name: Option<String>,
}

impl RuntimeParameters {
    /// The parameters as they appear in per-check metadata.
    pub fn to_meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("query".to_string(), Value::String(self.query.clone()));
        meta.insert(
            "schema".to_string(),
            self.schema_name
                .as_ref()
                .map(|s| Value::String(s.clone()))
                .unwrap_or(Value::Null),
        );
        meta
    }
}

/// A stored preview of a dataset. `rows` is a serialized JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub columns: Vec<String>,
    pub rows: String,
}

impl Sample {
    /// Decodes the stored rows.
    pub fn decoded_rows(&self) -> Result<Vec<Map<String, Value>>> {
        Ok(serde_json::from_str(&self.rows)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    pub datasource_id: String,
    pub dataset_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_parameters: Option<RuntimeParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Sample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<DateTime<Utc>>,
}

/// How a dataset's rows are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetAddress<'a> {
    /// A physical table, `schema.table` or a plain table name.
    Table { name: &'a str },
    /// An ad-hoc query with an optional schema.
    Query {
        query: &'a str,
        schema: Option<&'a str>,
    },
}

impl Dataset {
    /// Creates a table-addressed dataset.
    pub fn table(datasource_id: impl Into<String>, dataset_name: impl Into<String>) -> Self {
        Self {
            key: String::new(),
            datasource_id: datasource_id.into(),
            dataset_name: dataset_name.into(),
            runtime_parameters: None,
            sample: None,
            create_date: None,
            modified_date: None,
        }
    }

    /// Creates a query-addressed dataset.
    pub fn query(
        datasource_id: impl Into<String>,
        dataset_name: impl Into<String>,
        query: impl Into<String>,
        schema: Option<String>,
    ) -> Self {
        Self {
            runtime_parameters: Some(RuntimeParameters {
                query: query.into(),
                schema_name: schema,
            }),
            ..Self::table(datasource_id, dataset_name)
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Resolves the addressing mode, rejecting records that are neither a
    /// table nor a query with non-empty text.
    pub fn address(&self) -> Result<DatasetAddress<'_>> {
        match &self.runtime_parameters {
            Some(params) if params.query.trim().is_empty() => Err(TermError::invalid_dataset(
                &self.dataset_name,
                "runtime parameters require a non-empty query",
            )),
            Some(params) => Ok(DatasetAddress::Query {
                query: &params.query,
                schema: params.schema_name.as_deref().filter(|s| !s.is_empty()),
            }),
            None if self.dataset_name.trim().is_empty() => Err(TermError::invalid_dataset(
                &self.key,
                "table-addressed dataset requires a table name",
            )),
            None => Ok(DatasetAddress::Table {
                name: &self.dataset_name,
            }),
        }
    }
}
