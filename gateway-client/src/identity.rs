use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::org::OrgTag;

const X509_IDENTITY: &str = "X.509";

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("An identity for the user {label} does not exist in the wallet {}", .wallet.display())]
    NotFound { label: String, wallet: PathBuf },

    #[error("Invalid identity label {0:?}")]
    InvalidLabel(String),

    #[error("Failed to read identity file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed identity file {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// Credentials used to authenticate to the gateway on behalf of a user.
#[derive(Clone)]
pub struct Identity {
    pub label: String,
    pub wallet: PathBuf,
    pub msp_id: String,
    pub certificate: String,
    private_key: String,
}

impl Identity {
    pub fn new(
        label: impl Into<String>,
        wallet: impl Into<PathBuf>,
        msp_id: impl Into<String>,
        certificate: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Identity {
            label: label.into(),
            wallet: wallet.into(),
            msp_id: msp_id.into(),
            certificate: certificate.into(),
            private_key: private_key.into(),
        }
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("label", &self.label)
            .field("wallet", &self.wallet)
            .field("msp_id", &self.msp_id)
            .finish_non_exhaustive()
    }
}

/// Looks identities up by organization and user id.
pub trait IdentityStore: Send + Sync {
    fn resolve(&self, org: OrgTag, user_id: &str) -> Result<Identity, IdentityError>;
}

/// A directory-backed wallet laid out as `<root>/<org>/<user>.id`.
#[derive(Debug, Clone)]
pub struct WalletIdentityStore {
    root: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletEntry {
    credentials: Credentials,
    msp_id: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    certificate: String,
    private_key: String,
}

impl WalletIdentityStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        WalletIdentityStore { root: root.into() }
    }

    pub fn wallet_path(&self, org: OrgTag) -> PathBuf {
        self.root.join(org.wallet_dir())
    }

    fn read_entry(path: &Path) -> Result<WalletEntry, IdentityError> {
        let content = fs::read(path).map_err(|source| IdentityError::Io {
            path: path.to_owned(),
            source,
        })?;
        let entry: WalletEntry =
            serde_json::from_slice(&content).map_err(|e| IdentityError::Malformed {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;
        if entry.kind != X509_IDENTITY {
            return Err(IdentityError::Malformed {
                path: path.to_owned(),
                reason: format!("unsupported identity type {:?}", entry.kind),
            });
        }
        Ok(entry)
    }
}

impl IdentityStore for WalletIdentityStore {
    fn resolve(&self, org: OrgTag, user_id: &str) -> Result<Identity, IdentityError> {
        if user_id.is_empty() || user_id.contains(['/', '\\']) || user_id == ".." {
            return Err(IdentityError::InvalidLabel(user_id.to_owned()));
        }

        let wallet = self.wallet_path(org);
        let path = wallet.join(format!("{user_id}.id"));
        debug!("Reading identity {user_id} from {}", path.display());

        if !path.is_file() {
            return Err(IdentityError::NotFound {
                label: user_id.to_owned(),
                wallet,
            });
        }

        let entry = Self::read_entry(&path)?;
        Ok(Identity {
            label: user_id.to_owned(),
            wallet,
            msp_id: entry.msp_id,
            certificate: entry.credentials.certificate,
            private_key: entry.credentials.private_key,
        })
    }
}
