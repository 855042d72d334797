use std::{collections::HashMap, fs, io, path::PathBuf};

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::org::OrgTag;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read connection profile {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse connection profile: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid connection profile {name}: {reason}")]
    Invalid { name: String, reason: String },

    #[error("Connection profile {name} belongs to {found}, expected {expected}")]
    OrgMismatch {
        name: String,
        found: String,
        expected: OrgTag,
    },
}

/// Common connection profile describing the network as seen by one organization.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub client: ClientSection,
    #[serde(default)]
    pub organizations: HashMap<String, OrganizationSection>,
    #[serde(default)]
    pub peers: HashMap<String, PeerSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSection {
    pub organization: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationSection {
    pub mspid: String,
    #[serde(default)]
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerSection {
    pub url: String,
}

impl ConnectionProfile {
    /// Parses and validates a JSON connection profile.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProfileError> {
        let profile: ConnectionProfile = serde_json::from_slice(bytes)?;
        profile.first_peer()?;
        Ok(profile)
    }

    fn invalid(&self, reason: impl Into<String>) -> ProfileError {
        ProfileError::Invalid {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    pub fn organization(&self) -> Result<&OrganizationSection, ProfileError> {
        self.organizations
            .get(&self.client.organization)
            .ok_or_else(|| {
                self.invalid(format!(
                    "client organization {} is not described",
                    self.client.organization
                ))
            })
    }

    pub fn msp_id(&self) -> Result<&str, ProfileError> {
        Ok(&self.organization()?.mspid)
    }

    fn first_peer(&self) -> Result<&PeerSection, ProfileError> {
        let organization = self.organization()?;
        let name = organization.peers.first().ok_or_else(|| {
            self.invalid(format!(
                "organization {} lists no peers",
                self.client.organization
            ))
        })?;
        self.peers
            .get(name)
            .ok_or_else(|| self.invalid(format!("peer {name} is not described")))
    }

    /// Returns the HTTP endpoint of the organization's first peer.
    ///
    /// `grpcs://` and `grpc://` are mapped onto `https://` and `http://`. With
    /// `as_localhost` the host is replaced by `localhost`, which is how peers
    /// running in local containers are reached from the host.
    pub fn peer_endpoint(&self, as_localhost: bool) -> Result<String, ProfileError> {
        let raw = &self.first_peer()?.url;
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| self.invalid(format!("peer url {raw} has no scheme")))?;
        let scheme = match scheme {
            "grpcs" | "https" => "https",
            "grpc" | "http" => "http",
            other => return Err(self.invalid(format!("unsupported peer url scheme {other}"))),
        };

        let mut url = Url::parse(&format!("{scheme}://{rest}"))
            .map_err(|e| self.invalid(format!("peer url {raw}: {e}")))?;
        if as_localhost {
            url.set_host(Some("localhost"))
                .map_err(|e| self.invalid(format!("peer url {raw}: {e}")))?;
        }

        Ok(url.as_str().trim_end_matches('/').to_owned())
    }
}

/// Maps an organization onto its connection profile.
pub trait NetworkProfileResolver: Send + Sync {
    fn resolve(&self, org: OrgTag) -> Result<ConnectionProfile, ProfileError>;
}

/// Loads connection profiles from the JSON files generated for each organization.
#[derive(Debug, Clone)]
pub struct FileProfileResolver {
    org1: PathBuf,
    org2: PathBuf,
}

impl FileProfileResolver {
    pub fn new(org1: impl Into<PathBuf>, org2: impl Into<PathBuf>) -> Self {
        FileProfileResolver {
            org1: org1.into(),
            org2: org2.into(),
        }
    }

    pub fn path(&self, org: OrgTag) -> &PathBuf {
        match org {
            OrgTag::Org1 => &self.org1,
            OrgTag::Org2 => &self.org2,
        }
    }
}

impl NetworkProfileResolver for FileProfileResolver {
    fn resolve(&self, org: OrgTag) -> Result<ConnectionProfile, ProfileError> {
        let path = self.path(org);
        debug!("Loading {org} connection profile from {}", path.display());

        let content = fs::read(path).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;
        let profile = ConnectionProfile::from_json(&content)?;

        if !profile.client.organization.eq_ignore_ascii_case(org.name()) {
            return Err(ProfileError::OrgMismatch {
                name: profile.name,
                found: profile.client.organization,
                expected: org,
            });
        }
        Ok(profile)
    }
}
