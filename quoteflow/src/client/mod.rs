//! Execution client: the single channel to the backing store.
//!
//! ## Architecture
//!
//! - **ExecutionClient**: request/response trait. One statement in, result
//!   text or a classified [`StoreError`] out.
//! - **HttpExecutionClient**: production implementation over the store's
//!   HTTP interface.
//!
//! The engine never holds more than one request in flight.

mod http;

use async_trait::async_trait;
use quoteflow_shared::StoreError;

pub use http::{ConnectionSettings, HttpExecutionClient};

/// Stateless request/response channel to the store.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Execute one statement and return the trimmed result body.
    async fn execute(&self, command: &str) -> Result<String, StoreError>;
}

#[async_trait]
impl<T: ExecutionClient + ?Sized> ExecutionClient for &T {
    async fn execute(&self, command: &str) -> Result<String, StoreError> {
        (**self).execute(command).await
    }
}
