//! YAML configuration

use crate::{
    account::address::PubkeyConverter,
    client::Credentials,
    constants::{ADDRESS_HRP, ADDRESS_LEN},
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("empty destination clients list")]
    EmptyDestinations,
    #[error("incomplete credentials for {0}, both username and password are needed")]
    IncompleteCredentials(String),
}

/// What a run does with the computed accounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorKind {
    /// Stream the accounts index into a new dated index
    #[default]
    Reindex,
    /// Clone the accounts index, then overwrite the touched accounts
    Clone,
    /// Build a dated index from object storage dumps
    Snapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub address_pubkey_converter: PubkeyConverterConfig,
    pub api: ApiConfig,
    pub source_elastic: ElasticConfig,
    pub destinations: Vec<ElasticConfig>,
    pub snapshot: Option<SnapshotConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub delegation_legacy_contract_address: String,
    pub lkmex_staking_contract_address: String,
    pub energy_contract_address: String,
    pub validators_contract: String,
    pub legacy_delegation_source: LegacyDelegationSource,
}

/// Where legacy delegation amounts are read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyDelegationSource {
    /// Contract list views plus one stake query per address
    #[default]
    VmQuery,
    /// Decode the contract storage dump
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubkeyConverterConfig {
    pub length: usize,
    pub hrp: String,
}

impl Default for PubkeyConverterConfig {
    fn default() -> Self {
        Self {
            length: ADDRESS_LEN,
            hrp: ADDRESS_HRP.into(),
        }
    }
}

impl PubkeyConverterConfig {
    pub fn converter(&self) -> PubkeyConverter {
        PubkeyConverter::new(self.hrp.clone(), self.length)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: Option<u64>,
}

impl ApiConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl ElasticConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub url: Option<String>,
    pub bucket: Option<String>,
    pub local_dir: Option<PathBuf>,
    /// Defaults to the current epoch
    pub epoch: Option<u32>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Checks the settings a run of `kind` depends on
    pub fn validate(&self, kind: ProcessorKind) -> Result<(), ConfigError> {
        if self.api.url.is_empty() {
            return Err(ConfigError::Missing("api.url"));
        }
        check_credentials("api", &self.api.credentials())?;

        if self.general.legacy_delegation_source == LegacyDelegationSource::Storage
            && self.general.delegation_legacy_contract_address.is_empty()
        {
            return Err(ConfigError::Missing(
                "general.delegation_legacy_contract_address",
            ));
        }

        if kind != ProcessorKind::Snapshot {
            if self.source_elastic.url.is_empty() {
                return Err(ConfigError::Missing("source_elastic.url"));
            }
            check_credentials("source_elastic", &self.source_elastic.credentials())?;
        }

        if kind != ProcessorKind::Clone {
            if self.destinations.is_empty() {
                return Err(ConfigError::EmptyDestinations);
            }
            for (idx, destination) in self.destinations.iter().enumerate() {
                if destination.url.is_empty() {
                    return Err(ConfigError::Missing("destinations[].url"));
                }
                check_credentials(&format!("destinations[{idx}]"), &destination.credentials())?;
            }
        }

        if kind == ProcessorKind::Snapshot {
            let snapshot = self
                .snapshot
                .as_ref()
                .ok_or(ConfigError::Missing("snapshot"))?;
            let remote = snapshot.url.is_some() && snapshot.bucket.is_some();
            if !remote && snapshot.local_dir.is_none() {
                return Err(ConfigError::Missing("snapshot.url and snapshot.bucket, or snapshot.local_dir"));
            }
        }

        Ok(())
    }
}

fn check_credentials(name: &str, credentials: &Credentials) -> Result<(), ConfigError> {
    let only_one = credentials.username.is_empty() != credentials.password.is_empty();
    if only_one {
        return Err(ConfigError::IncompleteCredentials(name.into()));
    }
    Ok(())
}
