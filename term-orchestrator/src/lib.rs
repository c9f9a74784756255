//! # Term Orchestrator - Validation orchestration for stored expectations
//!
//! Term Orchestrator turns stored dataset pointers and expectation records
//! into validation runs against live data sources, normalizes the outcome
//! into durable validation records, proposes candidate expectations by
//! profiling a data sample and rolls validation history up into
//! success-rate statistics.
//!
//! ## Overview
//!
//! - [`connection`] resolves a datasource and dataset into an engine
//!   connection descriptor, applying per-engine schema quirks.
//! - [`batch`] describes which rows a run reads: a named table or an ad-hoc
//!   query.
//! - [`expectations`] and [`suite`] compile stored records into typed
//!   checks, translating stored `objective` thresholds to `mostly`.
//! - [`executor`] runs a compiled suite through an [`engine::ExecutionEngine`]
//!   and dispatches a notification for every finished run.
//! - [`profiler`] samples a dataset and suggests expectations.
//! - [`statistics`] computes 1, 7 and 31 day averages and a daily histogram.
//! - [`orchestrator`] ties the stores, engine and dispatcher together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use term_orchestrator::prelude::*;
//! use datafusion::prelude::SessionContext;
//! use serde_json::{json, Map};
//! use std::sync::Arc;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! store
//!     .insert_datasource(
//!         "warehouse",
//!         json!({
//!             "datasource_name": "warehouse",
//!             "engine": "PostgreSQL",
//!             "host": "localhost",
//!             "port": 5432,
//!             "username": "analyst",
//!             "password": "secret",
//!             "database": "sales"
//!         }),
//!     )
//!     .await;
//! let dataset_id = store.insert_dataset(Dataset::table("warehouse", "orders")).await;
//! store
//!     .insert_expectation(Expectation::new(
//!         "expect_column_values_to_not_be_null",
//!         json!({"column": "id", "objective": 0.95}).as_object().cloned().unwrap_or_default(),
//!         "warehouse",
//!         dataset_id.as_str(),
//!     ))
//!     .await;
//!
//! // The embedded engine evaluates against tables registered per datasource.
//! let ctx = SessionContext::new();
//! ctx.sql("CREATE TABLE orders (id INT)").await?.collect().await?;
//! let engine = DataFusionEngine::new().with_session("warehouse", ctx);
//!
//! let orchestrator = Orchestrator::new(
//!     Stores::in_memory(store),
//!     Arc::new(engine),
//!     Arc::new(NoopDispatcher),
//!     OrchestratorConfig::default(),
//! );
//! let validation = orchestrator.run_dataset_validation(&dataset_id, Map::new()).await?;
//! println!("{}% successful", validation.statistics.success_percent.unwrap_or(0.0));
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expectations;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod prelude;
pub mod profiler;
pub mod security;
pub mod statistics;
pub mod store;
pub mod suite;

#[cfg(test)]
pub mod test_helpers;
