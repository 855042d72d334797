use std::{fmt, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    gateway::{ConnectOptions, Connection, Gateway, GatewayError},
    identity::Identity,
    profile::ConnectionProfile,
};

pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// A named contract function together with its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    function_name: String,
    arguments: Vec<String>,
}

impl TransactionRequest {
    pub fn new(function_name: impl Into<String>, arguments: Vec<String>) -> Self {
        TransactionRequest {
            function_name: function_name.into(),
            arguments,
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Resolution,
    Submission,
    Timeout,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("ConnectionError: {0}")]
    Connection(GatewayError),

    #[error("ResolutionError: {0}")]
    Resolution(GatewayError),

    #[error("SubmissionError: {0}")]
    Submission(GatewayError),

    #[error("Timeout: no response within {0:?}")]
    Timeout(Duration),
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::Connection(_) => ErrorKind::Connection,
            TransactionError::Resolution(_) => ErrorKind::Resolution,
            TransactionError::Submission(_) => ErrorKind::Submission,
            TransactionError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// Raw bytes returned by a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload(bytes)
    }
}

/// JSON payloads are pretty-printed, anything else is shown as text.
impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::from_slice::<serde_json::Value>(&self.0) {
            Ok(json @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                let pretty = serde_json::to_string_pretty(&json).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
            _ => f.write_str(&String::from_utf8_lossy(&self.0)),
        }
    }
}

pub type TransactionResult = Result<Payload, TransactionError>;

/// Releases the connection when dropped, whichever way `submit` exits.
struct ConnectionGuard(Box<dyn Connection>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.disconnect();
        debug!("Gateway connection released");
    }
}

/// Submits one transaction per call over a connection it opens and always releases.
///
/// Nothing is retried: a failed submission is reported to the caller, which
/// decides whether repeating a state-changing transaction is safe.
pub struct TransactionClient<G> {
    gateway: G,
    options: ConnectOptions,
    timeout: Duration,
}

impl<G: Gateway> TransactionClient<G> {
    pub fn new(gateway: G, options: ConnectOptions) -> Self {
        TransactionClient {
            gateway,
            options,
            timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn submit(
        &self,
        profile: &ConnectionProfile,
        identity: &Identity,
        channel: &str,
        contract: &str,
        request: &TransactionRequest,
    ) -> TransactionResult {
        info!(
            "Submitting {} on {channel}/{contract} as {}",
            request.function_name(),
            identity.label
        );

        let result = tokio::time::timeout(
            self.timeout,
            self.submit_once(profile, identity, channel, contract, request),
        )
        .await
        .unwrap_or(Err(TransactionError::Timeout(self.timeout)));

        match &result {
            Ok(payload) => info!(
                "{} committed ({} bytes)",
                request.function_name(),
                payload.as_bytes().len()
            ),
            Err(e) => warn!("{} failed: {e}", request.function_name()),
        }
        result
    }

    async fn submit_once(
        &self,
        profile: &ConnectionProfile,
        identity: &Identity,
        channel: &str,
        contract: &str,
        request: &TransactionRequest,
    ) -> TransactionResult {
        let connection = ConnectionGuard(
            self.gateway
                .connect(profile, identity, &self.options)
                .await
                .map_err(TransactionError::Connection)?,
        );

        let handle = connection
            .0
            .resolve(channel, contract)
            .await
            .map_err(TransactionError::Resolution)?;

        let raw = connection
            .0
            .submit(&handle, request.function_name(), request.arguments())
            .await
            .map_err(TransactionError::Submission)?;

        Ok(Payload::from(raw))
    }
}
