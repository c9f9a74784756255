//! Prelude for commonly used types and traits in term-orchestrator.

pub use crate::config::{
    DispatchConfig, ExecutorConfig, OrchestratorConfig, ProfilerConfig, ResultFormat,
    StatisticsConfig,
};
pub use crate::dispatch::{
    ActionDispatcher, ActionNotification, ActionStatus, DispatchError, NoopDispatcher,
    QueuedDispatcher,
};
pub use crate::engine::{DataFusionEngine, EngineError, ExecutionEngine};
pub use crate::error::{ErrorContext, ErrorKind, Result, TermError};
pub use crate::executor::{SampleResponse, ValidationExecutor};
pub use crate::expectations::ExpectationType;
pub use crate::logging::LogConfig;
pub use crate::model::{Dataset, Datasource, EngineKind, Expectation, Validation};
pub use crate::orchestrator::{Orchestrator, Stores};
pub use crate::statistics::DatasetStatistics;
pub use crate::store::{InMemoryStore, ValidationFilter, ValidationQuery};
