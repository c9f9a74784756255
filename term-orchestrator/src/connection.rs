//! Resolves a datasource and dataset into an engine connection descriptor.
//!
//! Some engines need the schema inside the connection itself. Which schema
//! is embedded depends on the engine and on how the dataset is addressed:
//!
//! | engine    | query-addressed            | table-addressed                   |
//! |-----------|----------------------------|-----------------------------------|
//! | Snowflake | runtime parameter `schema` | none                              |
//! | BigQuery  | runtime parameter `schema` | leading segment of `dataset_name` |
//! | others    | none                       | none                              |

use tracing::{debug, instrument};

use crate::error::{Result, TermError};
use crate::model::{Dataset, DatasetAddress, Datasource, EngineKind};
use crate::security::SecureString;

/// Everything an engine needs to open a session for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionDescriptor {
    pub datasource_name: String,
    pub engine: EngineKind,
    pub url: SecureString,
    /// Schema embedded into the connection, if any.
    pub schema: Option<String>,
}

/// Per-engine rule for picking the embedded schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStrategy {
    Ignore,
    QuerySchema,
    QueryOrTableSchema,
}

impl SchemaStrategy {
    pub fn for_engine(engine: EngineKind) -> Self {
        match engine {
            EngineKind::Snowflake => SchemaStrategy::QuerySchema,
            EngineKind::BigQuery => SchemaStrategy::QueryOrTableSchema,
            EngineKind::Postgres
            | EngineKind::Redshift
            | EngineKind::MySql
            | EngineKind::Athena
            | EngineKind::Trino
            | EngineKind::Databricks => SchemaStrategy::Ignore,
        }
    }

    fn schema<'a>(&self, dataset: &'a Dataset) -> Result<Option<&'a str>> {
        let address = dataset.address()?;
        match (self, address) {
            (SchemaStrategy::Ignore, _) => Ok(None),
            (
                SchemaStrategy::QuerySchema | SchemaStrategy::QueryOrTableSchema,
                DatasetAddress::Query { schema, .. },
            ) => Ok(schema),
            (SchemaStrategy::QuerySchema, DatasetAddress::Table { .. }) => Ok(None),
            (SchemaStrategy::QueryOrTableSchema, DatasetAddress::Table { name }) => {
                match name.split_once('.') {
                    Some((schema, _)) if !schema.is_empty() => Ok(Some(schema)),
                    _ => Err(TermError::invalid_dataset(
                        name,
                        "BigQuery tables must be addressed as '<dataset>.<table>'",
                    )),
                }
            }
        }
    }
}

/// Builds the connection descriptor for running checks on `dataset`.
#[instrument(skip_all, fields(datasource = %datasource.datasource_name, engine = %datasource.engine))]
pub fn resolve(datasource: &Datasource, dataset: &Dataset) -> Result<ConnectionDescriptor> {
    let strategy = SchemaStrategy::for_engine(datasource.engine);
    let schema = strategy.schema(dataset)?;
    debug!(?strategy, ?schema, "Resolved connection schema");

    Ok(ConnectionDescriptor {
        datasource_name: datasource.datasource_name.clone(),
        engine: datasource.engine,
        url: datasource.connection_url(schema)?,
        schema: schema.map(str::to_string),
    })
}
