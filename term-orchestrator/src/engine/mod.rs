//! The boundary between the orchestrator and an SQL-capable execution engine.
//!
//! An engine receives a resolved connection, a batch description and a
//! compiled suite, and returns one [`RawOutcome`] per check in suite order.
//! Failures that prevent the batch from being read at all are reported as
//! [`EngineError`] and classified so callers can tell a broken query from a
//! missing table or a slow backend.

pub mod datafusion;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::batch::BatchDescriptor;
use crate::connection::ConnectionDescriptor;
use crate::error::{whole_seconds, ErrorKind};
use crate::model::{ExceptionInfo, ExpectationConfig};
use crate::suite::CompiledSuite;

pub use self::datafusion::DataFusionEngine;

/// Errors raised by an execution engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The ad-hoc query could not be parsed or planned.
    #[error("Syntax error: {message}")]
    SyntaxError { message: String },

    /// The named table does not exist.
    #[error("Table '{name}' not found: {message}")]
    NotFound { name: String, message: String },

    /// The call did not finish in time.
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// The datasource could not be reached.
    #[error("Connection to '{datasource}' failed: {message}")]
    Connection { datasource: String, message: String },

    /// Any other failure while evaluating the batch.
    #[error("Execution failed: {message}")]
    Execution { message: String },
}

impl EngineError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::SyntaxError {
            message: message.into(),
        }
    }

    pub fn not_found(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds: whole_seconds(after),
        }
    }

    pub fn connection(datasource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            datasource: datasource.into(),
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SyntaxError { .. } | Self::NotFound { .. } => ErrorKind::Query,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Connection { .. } => ErrorKind::Connectivity,
            Self::Execution { .. } => ErrorKind::Internal,
        }
    }

    /// Timeouts and connection failures may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection { .. })
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Per-run engine options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionOptions {
    /// The engine may evaluate checks in parallel.
    pub allow_concurrency: bool,
}

/// Unnormalized outcome of one check, in engine vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutcome {
    pub expectation_config: ExpectationConfig,
    pub success: bool,
    #[serde(default)]
    pub result: Map<String, Value>,
    #[serde(default)]
    pub exception_info: ExceptionInfo,
}

/// Preview rows of a batch. Datetimes are strings, missing values are null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleData {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

/// An SQL-capable backend that evaluates compiled suites.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Evaluates every check against one logical scan of `batch`.
    ///
    /// Returns one outcome per check, in suite order.
    async fn execute(
        &self,
        connection: &ConnectionDescriptor,
        batch: &BatchDescriptor,
        suite: &CompiledSuite,
        options: ExecutionOptions,
    ) -> EngineResult<Vec<RawOutcome>>;

    /// Returns the first `row_limit` rows of `batch`.
    async fn sample(
        &self,
        connection: &ConnectionDescriptor,
        batch: &BatchDescriptor,
        row_limit: usize,
    ) -> EngineResult<SampleData>;
}
