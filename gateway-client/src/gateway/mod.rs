//! The seam between the client core and the ledger network.
//!
//! A [`Gateway`] opens a [`Connection`] for one identity. The connection
//! resolves a channel and contract into a [`ContractRef`] and submits
//! transactions against it. Connections are released with
//! [`Connection::disconnect`], which is synchronous so it can run from `Drop`.

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
mod models;
pub mod rest;

use async_trait::async_trait;
use thiserror::Error;

use crate::{identity::Identity, profile::ConnectionProfile};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Gateway is unreachable: {0}")]
    Unreachable(String),

    #[error("Connection profile is unusable: {0}")]
    Profile(String),

    #[error("Channel {0} does not exist")]
    ChannelNotFound(String),

    #[error("Contract {contract} is not deployed on channel {channel}")]
    ContractNotFound { channel: String, contract: String },

    #[error("Endorsement failed: {0}")]
    Endorsement(String),

    #[error("Transaction was invalidated on commit: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected gateway response: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Asks the gateway which channels and contracts exist before resolving.
    pub discovery: bool,
    pub as_localhost: bool,
    /// Used instead of the peer endpoint taken from the connection profile.
    pub endpoint: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            discovery: true,
            as_localhost: true,
            endpoint: None,
        }
    }
}

/// A contract resolved on a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRef {
    pub channel: String,
    pub contract: String,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        identity: &Identity,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Connection>, GatewayError>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    async fn resolve(&self, channel: &str, contract: &str) -> Result<ContractRef, GatewayError>;

    async fn submit(
        &self,
        contract: &ContractRef,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, GatewayError>;

    fn disconnect(&mut self);
}
