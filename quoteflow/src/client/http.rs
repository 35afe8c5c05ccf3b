//! HTTP execution client.
//!
//! The store's HTTP interface executes one statement per request: the
//! statement is the POST body, credentials and database travel as query
//! parameters, and any non-2xx status carries the diagnostic in the body.

use super::ExecutionClient;
use async_trait::async_trait;
use quoteflow_shared::StoreError;
use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};
use std::time::Duration;

/// Per-request timeout. Range deletes on large tables can take a while.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Where and how to reach the store.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub tls: bool,
    /// Verify the server certificate. Off by default: deployments commonly
    /// run with self-signed certificates.
    pub tls_verify: bool,
}

impl ConnectionSettings {
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}:{}/", self.host, self.port)
    }
}

pub struct HttpExecutionClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    database: String,
}

impl HttpExecutionClient {
    pub fn new(settings: &ConnectionSettings) -> QuoteflowResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(settings.tls && !settings.tls_verify)
            .build()
            .map_err(|e| QuoteflowError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: settings.base_url(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            database: settings.database.clone(),
        })
    }
}

impl std::fmt::Debug for HttpExecutionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutionClient")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish()
    }
}

#[async_trait]
impl ExecutionClient for HttpExecutionClient {
    async fn execute(&self, command: &str) -> Result<String, StoreError> {
        tracing::trace!(statement = %command, "Executing statement");

        let resp = self
            .http
            .post(&self.base_url)
            .query(&[
                ("user", self.user.as_str()),
                ("password", self.password.as_str()),
                ("database", self.database.as_str()),
            ])
            .body(command.to_owned())
            .send()
            .await
            .map_err(|e| StoreError::transport(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| StoreError::transport(format!("failed to read response body: {e}")))?;
        let body = body.trim().to_string();

        if status.is_success() {
            Ok(body)
        } else {
            tracing::debug!(status = %status, error = %body, "Statement rejected by store");
            Err(StoreError::new(body))
        }
    }
}
