//! Error types for the Term orchestration engine.
//!
//! All fallible operations return [`TermError`]. Subsystems with their own
//! failure vocabulary (the execution engine, the dispatch channel) define
//! dedicated error enums that convert into `TermError` with `?`.
//!
//! Every error reports an [`ErrorKind`] so callers can map failures to
//! distinct user-facing messages without matching on individual variants.

use std::time::Duration;
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::engine::EngineError;

/// Machine-distinguishable category of a [`TermError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A stored record is corrupted or references something this build does not know.
    Configuration,
    /// The stored expectation parameters do not match the registered schema.
    InvalidParameters,
    /// The dataset query or table could not be resolved by the engine.
    Query,
    /// An external call did not finish within its deadline.
    Timeout,
    /// The engine could not reach the datasource.
    Connectivity,
    /// A requested record does not exist.
    NotFound,
    /// The post-run notification could not be delivered.
    Dispatch,
    /// Unexpected internal condition.
    Internal,
}

/// The main error type for the orchestration engine.
#[derive(Error, Debug)]
pub enum TermError {
    /// A datasource record carries an engine tag this build does not know.
    #[error("Unknown engine kind '{engine}' for datasource '{datasource}'")]
    UnknownEngine {
        /// Key or name of the offending datasource
        datasource: String,
        /// The unrecognized engine tag
        engine: String,
    },

    /// A datasource record is missing fields its engine requires.
    #[error("Invalid datasource '{datasource}': {message}")]
    InvalidDatasource { datasource: String, message: String },

    /// A dataset violates the table-or-query addressing invariant.
    #[error("Invalid dataset '{dataset}': {message}")]
    InvalidDataset { dataset: String, message: String },

    /// A stored expectation references a check kind this build does not implement.
    #[error("expectation '{expectation_type}' has not been implemented")]
    UnsupportedExpectationType { expectation_type: String },

    /// Expectation parameters failed validation against the registered schema.
    #[error("Invalid kwargs for '{expectation_type}' at '{field}': {message}")]
    InvalidKwargs {
        /// Expectation type whose schema was violated
        expectation_type: String,
        /// Path of the offending field, e.g. `kwargs.column`
        field: String,
        /// Detailed error message
        message: String,
    },

    /// An expectation points at a dataset bound to a different datasource.
    #[error("expectation datasource_id '{expectation}' does not match dataset datasource_id '{dataset}'")]
    DatasourceMismatch { expectation: String, dataset: String },

    /// A check result could not be correlated with its stored expectation.
    #[error("Missing expectation_id for '{expectation_type}'")]
    MissingExpectationId { expectation_type: String },

    /// A record requested by id does not exist.
    #[error("{resource} with id '{key}' does not exist")]
    NotFound { resource: &'static str, key: String },

    /// Error reported by the execution engine.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Error reported by the dispatch channel.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A repository call did not finish within the configured deadline.
    #[error("Repository call '{operation}' timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Error from a repository backend.
    #[error("Repository error during {operation}: {message}")]
    Repository { operation: String, message: String },

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates an invalid kwargs error for the given field.
    pub fn invalid_kwargs(
        expectation_type: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidKwargs {
            expectation_type: expectation_type.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid dataset error.
    pub fn invalid_dataset(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDataset {
            dataset: dataset.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid datasource error.
    pub fn invalid_datasource(datasource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDatasource {
            datasource: datasource.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error for the given resource type.
    pub fn not_found(resource: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            key: key.into(),
        }
    }

    /// Creates a repository error.
    pub fn repository(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Repository {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a repository timeout error.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds: whole_seconds(after),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownEngine { .. }
            | Self::InvalidDatasource { .. }
            | Self::InvalidDataset { .. }
            | Self::UnsupportedExpectationType { .. }
            | Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidKwargs { .. }
            | Self::DatasourceMismatch { .. }
            | Self::SecurityError(_) => ErrorKind::InvalidParameters,
            Self::Engine(engine) => engine.kind(),
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Dispatch(_) => ErrorKind::Dispatch,
            Self::MissingExpectationId { .. }
            | Self::Repository { .. }
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Engine(engine) => engine.is_retryable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Seconds reported for a deadline, rounded up so sub-second limits never read as 0s.
pub(crate) fn whole_seconds(after: Duration) -> u64 {
    after.as_secs() + u64::from(after.subsec_nanos() > 0)
}

impl From<serde_json::Error> for TermError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
            other => TermError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
                other => TermError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_expectation_message() {
        let err = TermError::UnsupportedExpectationType {
            expectation_type: "expect_column_to_be_purple".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "expectation 'expect_column_to_be_purple' has not been implemented"
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_invalid_kwargs_carries_field_path() {
        let err = TermError::invalid_kwargs(
            "expect_column_values_to_not_be_null",
            "kwargs.column",
            "missing required field",
        );
        assert!(err.to_string().contains("kwargs.column"));
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    }

    #[test]
    fn test_engine_error_kinds() {
        let syntax: TermError = EngineError::syntax("unexpected token").into();
        let timeout: TermError = EngineError::timeout("execute", Duration::from_secs(30)).into();

        assert_eq!(syntax.kind(), ErrorKind::Query);
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert!(timeout.is_retryable());
        assert!(!syntax.is_retryable());
    }

    #[test]
    fn test_repository_timeout_is_retryable() {
        let err = TermError::timeout("get_dataset", Duration::from_millis(50));
        assert_eq!(
            err.to_string(),
            "Repository call 'get_dataset' timed out after 1s"
        );
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_not_found_message() {
        let err = TermError::not_found("dataset", "abc");
        assert_eq!(err.to_string(), "dataset with id 'abc' does not exist");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(TermError::Internal("Something went wrong".to_string()))
        }

        let err = failing_operation()
            .context("During suite compilation")
            .unwrap_err();
        assert!(err.to_string().contains("During suite compilation"));
    }
}
