use std::{fmt, str::FromStr};

use thiserror::Error;

/// One of the two organizations the auction network is deployed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrgTag {
    Org1,
    Org2,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Org must be Org1 or Org2, got {0:?}")]
pub struct InvalidOrg(pub String);

impl OrgTag {
    pub fn name(self) -> &'static str {
        match self {
            OrgTag::Org1 => "Org1",
            OrgTag::Org2 => "Org2",
        }
    }

    /// Name of the wallet sub-directory holding this organization's identities.
    pub fn wallet_dir(self) -> &'static str {
        match self {
            OrgTag::Org1 => "org1",
            OrgTag::Org2 => "org2",
        }
    }
}

impl FromStr for OrgTag {
    type Err = InvalidOrg;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [OrgTag::Org1, OrgTag::Org2]
            .into_iter()
            .find(|org| org.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| InvalidOrg(s.to_owned()))
    }
}

impl fmt::Display for OrgTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
