//! Command-line and environment configuration.
//!
//! Every flag falls back to an environment variable so the tool can run
//! from a container with no arguments beyond the subcommand.

use crate::catalog::AdapterSettings;
use crate::client::ConnectionSettings;
use clap::{ArgAction, Args};
use quoteflow_shared::errors::{QuoteflowError, QuoteflowResult};

/// Store connection flags.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Store host
    #[arg(long, env = "CH_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Store HTTP(S) port
    #[arg(long, env = "CH_PORT", default_value_t = 8443)]
    pub port: u16,

    /// Store user
    #[arg(long, env = "CH_USER")]
    pub user: String,

    /// Store password
    #[arg(long, env = "CH_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Database holding the pipeline objects
    #[arg(long, env = "CH_DATABASE", default_value = "default")]
    pub database: String,

    /// Use HTTPS
    #[arg(long, env = "CH_TLS", default_value_t = true, action = ArgAction::Set)]
    pub tls: bool,

    /// Verify the server certificate
    #[arg(long, env = "CH_TLS_VERIFY", default_value_t = false, action = ArgAction::Set)]
    pub tls_verify: bool,
}

impl StoreArgs {
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            tls: self.tls,
            tls_verify: self.tls_verify,
        }
    }
}

/// Message-queue flags baked into adapter table definitions.
#[derive(Debug, Clone, Args)]
pub struct AdapterArgs {
    /// Broker address as seen from the store
    #[arg(long, env = "KAFKA_BROKER", default_value = "kafka:9092")]
    pub kafka_broker: String,

    /// SASL user for the adapter tables
    #[arg(long, env = "KAFKA_USER")]
    pub kafka_user: Option<String>,

    /// SASL password for the adapter tables
    #[arg(long, env = "KAFKA_PASSWORD", hide_env_values = true)]
    pub kafka_password: Option<String>,

    #[arg(long, env = "KAFKA_SECURITY_PROTOCOL", default_value = "SASL_PLAINTEXT")]
    pub kafka_security_protocol: String,

    /// Realtime topic
    #[arg(long, env = "TOPIC_RT", default_value = "quotes")]
    pub topic_rt: String,

    /// History topic
    #[arg(long, env = "TOPIC_HISTORY", default_value = "quotes_history")]
    pub topic_history: String,
}

impl AdapterArgs {
    /// Settings for commands that never create adapter tables. Missing
    /// credentials are left empty.
    pub fn settings(&self) -> AdapterSettings {
        AdapterSettings {
            broker: self.kafka_broker.clone(),
            user: self.kafka_user.clone().unwrap_or_default(),
            password: self.kafka_password.clone().unwrap_or_default(),
            security_protocol: self.kafka_security_protocol.clone(),
            topic_realtime: self.topic_rt.clone(),
            topic_history: self.topic_history.clone(),
        }
    }

    /// Settings for commands that create adapter tables.
    ///
    /// # Errors
    ///
    /// `Validation` when either credential is missing or empty.
    pub fn require_credentials(&self) -> QuoteflowResult<AdapterSettings> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        if !present(&self.kafka_user) || !present(&self.kafka_password) {
            return Err(QuoteflowError::Validation(
                "--kafka-user and --kafka-password (or KAFKA_USER / KAFKA_PASSWORD) are required"
                    .into(),
            ));
        }
        Ok(self.settings())
    }
}
