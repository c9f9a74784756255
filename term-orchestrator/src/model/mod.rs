//! Stored records the orchestrator reads and produces.

pub mod datasource;
pub mod dataset;
pub mod expectation;
pub mod validation;

pub use datasource::{
    AthenaCredentials, BigQueryCredentials, Credentials, DatabricksCredentials, Datasource,
    EngineKind, HostCredentials, SnowflakeCredentials, TrinoCredentials,
};
pub use dataset::{Dataset, DatasetAddress, RuntimeParameters, Sample};
pub use expectation::{Expectation, Kwargs};
pub use validation::{
    ExceptionInfo, ExpectationConfig, RunId, Statistics, Validation, ValidationMeta,
    ValidationResult,
};
