use std::{path::PathBuf, time::Duration};

use auction_gateway_client::ConnectOptions;
use thiserror::Error;

// Environment variables
const FABRIC_CHANNEL: &str = "FABRIC_CHANNEL";
const FABRIC_CHANNEL_DEFAULT: &str = "mychannel";
const FABRIC_CONTRACT: &str = "FABRIC_CONTRACT";
const FABRIC_CONTRACT_DEFAULT: &str = "auction";
const FABRIC_WALLET_DIR: &str = "FABRIC_WALLET_DIR";
const FABRIC_WALLET_DIR_DEFAULT: &str = "wallet";
const FABRIC_ORG1_PROFILE: &str = "FABRIC_ORG1_PROFILE";
const FABRIC_ORG1_PROFILE_DEFAULT: &str =
    "../../test-network/organizations/peerOrganizations/org1.example.com/connection-org1.json";
const FABRIC_ORG2_PROFILE: &str = "FABRIC_ORG2_PROFILE";
const FABRIC_ORG2_PROFILE_DEFAULT: &str =
    "../../test-network/organizations/peerOrganizations/org2.example.com/connection-org2.json";
const FABRIC_GATEWAY_URL: &str = "FABRIC_GATEWAY_URL";
const FABRIC_AS_LOCALHOST: &str = "FABRIC_AS_LOCALHOST";
const FABRIC_AS_LOCALHOST_DEFAULT: &str = "true";
const FABRIC_DISCOVERY: &str = "FABRIC_DISCOVERY";
const FABRIC_DISCOVERY_DEFAULT: &str = "true";
const SUBMIT_TIMEOUT_SEC: &str = "SUBMIT_TIMEOUT_SEC";
const SUBMIT_TIMEOUT_SEC_DEFAULT: &str = "30";
const MEASURE_DIR: &str = "MEASURE_DIR";
const MEASURE_DIR_DEFAULT: &str = ".";

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Failed to parse {var} {value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub channel: String,
    pub contract: String,
    pub wallet_dir: PathBuf,
    pub org1_profile: PathBuf,
    pub org2_profile: PathBuf,
    pub connect: ConnectOptions,
    pub submit_timeout: Duration,
    pub measure_dir: PathBuf,
}

pub fn read_config() -> Result<Options, ConfigError> {
    read_config_with(|var_name| std::env::var(var_name).ok())
}

pub fn read_config_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Options, ConfigError> {
    let read_env = |var_name: &str, default_value: &str| {
        lookup(var_name).unwrap_or_else(|| default_value.to_string())
    };

    let read_bool = |var_name: &'static str, default_value: &str| {
        let value = read_env(var_name, default_value);
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError {
                var: var_name,
                value,
                reason: "expected true or false".into(),
            }),
        }
    };

    let timeout = read_env(SUBMIT_TIMEOUT_SEC, SUBMIT_TIMEOUT_SEC_DEFAULT);
    let submit_timeout = match timeout.parse::<u64>() {
        Ok(0) => Err("must be positive".to_string()),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(e.to_string()),
    }
    .map_err(|reason| ConfigError {
        var: SUBMIT_TIMEOUT_SEC,
        value: timeout,
        reason,
    })?;

    let endpoint = lookup(FABRIC_GATEWAY_URL).filter(|url| !url.is_empty());

    Ok(Options {
        channel: read_env(FABRIC_CHANNEL, FABRIC_CHANNEL_DEFAULT),
        contract: read_env(FABRIC_CONTRACT, FABRIC_CONTRACT_DEFAULT),
        wallet_dir: read_env(FABRIC_WALLET_DIR, FABRIC_WALLET_DIR_DEFAULT).into(),
        org1_profile: read_env(FABRIC_ORG1_PROFILE, FABRIC_ORG1_PROFILE_DEFAULT).into(),
        org2_profile: read_env(FABRIC_ORG2_PROFILE, FABRIC_ORG2_PROFILE_DEFAULT).into(),
        connect: ConnectOptions {
            discovery: read_bool(FABRIC_DISCOVERY, FABRIC_DISCOVERY_DEFAULT)?,
            as_localhost: read_bool(FABRIC_AS_LOCALHOST, FABRIC_AS_LOCALHOST_DEFAULT)?,
            endpoint,
        },
        submit_timeout,
        measure_dir: read_env(MEASURE_DIR, MEASURE_DIR_DEFAULT).into(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Options, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        read_config_with(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let options = config(&[]).unwrap();
        assert_eq!(options.channel, "mychannel");
        assert_eq!(options.contract, "auction");
        assert_eq!(options.wallet_dir, PathBuf::from("wallet"));
        assert!(options.org1_profile.ends_with("connection-org1.json"));
        assert!(options.org2_profile.ends_with("connection-org2.json"));
        assert_eq!(options.connect, ConnectOptions::default());
        assert_eq!(options.submit_timeout, Duration::from_secs(30));
        assert_eq!(options.measure_dir, PathBuf::from("."));
    }

    #[test]
    fn overrides() {
        let options = config(&[
            ("FABRIC_CHANNEL", "auctions"),
            ("FABRIC_GATEWAY_URL", "http://gateway:8080"),
            ("FABRIC_AS_LOCALHOST", "false"),
            ("FABRIC_DISCOVERY", "0"),
            ("SUBMIT_TIMEOUT_SEC", "5"),
            ("MEASURE_DIR", "/tmp/measure"),
        ])
        .unwrap();
        assert_eq!(options.channel, "auctions");
        assert_eq!(options.connect.endpoint.as_deref(), Some("http://gateway:8080"));
        assert!(!options.connect.as_localhost);
        assert!(!options.connect.discovery);
        assert_eq!(options.submit_timeout, Duration::from_secs(5));
        assert_eq!(options.measure_dir, PathBuf::from("/tmp/measure"));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert_eq!(config(&[("SUBMIT_TIMEOUT_SEC", "soon")]).unwrap_err().var, SUBMIT_TIMEOUT_SEC);
        assert_eq!(config(&[("SUBMIT_TIMEOUT_SEC", "0")]).unwrap_err().var, SUBMIT_TIMEOUT_SEC);
        assert_eq!(
            config(&[("FABRIC_AS_LOCALHOST", "maybe")]).unwrap_err().var,
            FABRIC_AS_LOCALHOST
        );
    }

    #[test]
    fn empty_gateway_url_is_ignored() {
        assert_eq!(config(&[("FABRIC_GATEWAY_URL", "")]).unwrap().connect.endpoint, None);
    }
}
