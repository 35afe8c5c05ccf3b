//! Lifecycle orchestration for the quotes ingestion-to-rollup pipeline.
//!
//! The pipeline is a fixed set of store objects: a raw table, a rollup
//! table, message-queue adapter tables, and the materialized views wiring
//! them together. [`StateTransitionEngine`] creates, rebuilds, range-deletes
//! and tears them down through an [`ExecutionClient`], converging from any
//! starting state without reading it.

pub mod catalog;
pub mod client;
pub mod config;
pub mod engine;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod scope;
pub mod sql;
pub mod time_range;

#[cfg(test)]
mod testing;

pub use catalog::{AdapterSettings, ObjectCatalog, ObjectKind, PipelineObject};
pub use client::{ConnectionSettings, ExecutionClient, HttpExecutionClient};
pub use engine::{CleanReport, CleanRequest, ObjectStatus, StateTransitionEngine, Visibility};
pub use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};
pub use retry::{AttachOutcome, RetryPolicy, attach_with_retry};
pub use scope::{CleanTarget, ScopeFilter};
pub use time_range::TimeRange;
