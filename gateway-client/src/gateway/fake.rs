//! An in-process [`Gateway`] that counts what it is asked to do.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;

use super::{ConnectOptions, Connection, ContractRef, Gateway, GatewayError};
use crate::{identity::Identity, profile::ConnectionProfile};

/// How the fake behaves once a connection has been requested.
#[derive(Debug, Clone)]
pub enum Script {
    Succeed(Vec<u8>),
    RefuseConnection,
    MissingContract,
    Reject(GatewayError),
    /// Submission never completes.
    Hang,
    /// Submission panics.
    Panic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedCall {
    pub identity: String,
    pub msp_id: String,
    pub contract: ContractRef,
    pub function: String,
    pub args: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeStats {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    calls: Mutex<Vec<SubmittedCall>>,
}

impl FakeStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Every submission attempt, including ones that later failed.
    pub fn calls(&self) -> Vec<SubmittedCall> {
        self.calls.lock().expect("fake stats poisoned").clone()
    }
}

#[derive(Debug, Clone)]
pub struct FakeGateway {
    script: Script,
    stats: Arc<FakeStats>,
}

impl FakeGateway {
    pub fn new(script: Script) -> Self {
        FakeGateway {
            script,
            stats: Arc::default(),
        }
    }

    pub fn succeeding(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(Script::Succeed(payload.into()))
    }

    pub fn stats(&self) -> Arc<FakeStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn connect(
        &self,
        _profile: &ConnectionProfile,
        identity: &Identity,
        _options: &ConnectOptions,
    ) -> Result<Box<dyn Connection>, GatewayError> {
        if let Script::RefuseConnection = self.script {
            return Err(GatewayError::Unreachable("connection refused".into()));
        }
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            script: self.script.clone(),
            stats: self.stats.clone(),
            identity: identity.label.clone(),
            msp_id: identity.msp_id.clone(),
        }))
    }
}

struct FakeConnection {
    script: Script,
    stats: Arc<FakeStats>,
    identity: String,
    msp_id: String,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn resolve(&self, channel: &str, contract: &str) -> Result<ContractRef, GatewayError> {
        if let Script::MissingContract = self.script {
            return Err(GatewayError::ContractNotFound {
                channel: channel.to_owned(),
                contract: contract.to_owned(),
            });
        }
        Ok(ContractRef {
            channel: channel.to_owned(),
            contract: contract.to_owned(),
        })
    }

    async fn submit(
        &self,
        contract: &ContractRef,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, GatewayError> {
        self.stats
            .calls
            .lock()
            .expect("fake stats poisoned")
            .push(SubmittedCall {
                identity: self.identity.clone(),
                msp_id: self.msp_id.clone(),
                contract: contract.clone(),
                function: function.to_owned(),
                args: args.to_vec(),
            });

        match &self.script {
            Script::Succeed(payload) => Ok(payload.clone()),
            Script::Reject(err) => Err(err.clone()),
            Script::Hang => std::future::pending().await,
            Script::Panic => panic!("gateway blew up during {function}"),
            Script::RefuseConnection | Script::MissingContract => {
                unreachable!("scripted failure happens before submission")
            }
        }
    }

    fn disconnect(&mut self) {
        self.stats.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
