//! Client core for submitting transactions to the auction contract through a ledger gateway.
//!
//! A submission resolves an [`identity::Identity`] from a wallet and a
//! [`profile::ConnectionProfile`] for the organization, then hands both to a
//! [`transaction::TransactionClient`], which owns the connection lifecycle.
//! [`measurement::TimedInvoker`] records how long each attempt took.

pub mod gateway;
pub mod identity;
pub mod measurement;
pub mod org;
pub mod profile;
pub mod transaction;

pub use {
    gateway::{ConnectOptions, Gateway},
    identity::{Identity, IdentityStore, WalletIdentityStore},
    measurement::{Measurement, MeasurementLog, TimedInvoker},
    org::OrgTag,
    profile::{ConnectionProfile, FileProfileResolver, NetworkProfileResolver},
    transaction::{Payload, TransactionClient, TransactionError, TransactionRequest},
};
