//! Project configuration (`Stakeploy.toml`).
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults (a `localhost` development network),
//! 2. the TOML configuration file,
//! 3. `STAKEPLOY_*` environment variables, `__` separating nested keys
//!    (e.g. `STAKEPLOY_NETWORKS__SEPOLIA__URL`).

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{AccountSpec, DeployError};

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Stakeploy.toml";

/// Prefix of the environment variables overriding the configuration.
const ENV_PREFIX: &str = "STAKEPLOY_";

/// Name of the network used when none is configured or requested.
const DEFAULT_NETWORK: &str = "localhost";

/// Configuration of one target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the network.
    pub url: Url,
    /// Chain id the deployments of this network are bound to.
    pub chain_id: u64,
    /// Ephemeral networks keep their address registry in memory only.
    #[serde(default)]
    pub ephemeral: bool,
    /// Maximum time to wait for a creation receipt, in seconds.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

fn default_receipt_timeout_secs() -> u64 {
    crate::factory::DEFAULT_RECEIPT_TIMEOUT.as_secs()
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeployConfig {
    /// Root directory of the address registry.
    pub deployments_dir: PathBuf,
    /// Directory holding the compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    /// Network used when none is requested.
    pub default_network: String,
    /// Known networks, by name.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Account roles available to deployment units.
    pub named_accounts: BTreeMap<String, AccountSpec>,
}

impl Default for StakeployConfig {
    fn default() -> Self {
        let localhost = NetworkConfig {
            url: Url::parse("http://127.0.0.1:8545").expect("static URL is valid"),
            chain_id: 31337,
            ephemeral: false,
            receipt_timeout_secs: default_receipt_timeout_secs(),
        };

        Self {
            deployments_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            default_network: DEFAULT_NETWORK.to_string(),
            networks: BTreeMap::from([(DEFAULT_NETWORK.to_string(), localhost)]),
            named_accounts: BTreeMap::from([("deployer".to_string(), AccountSpec::Index(0))]),
        }
    }
}

impl StakeployConfig {
    /// Load the configuration.
    ///
    /// An explicit `path` must exist; without one, `Stakeploy.toml` in the working
    /// directory is used when present.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) if path.is_dir() => path.join(CONFIG_FILENAME),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        if path.is_some() && !file.exists() {
            anyhow::bail!("Configuration file not found: {}", file.display());
        }

        let config = Self::figment(&file)
            .extract::<Self>()
            .with_context(|| format!("Failed to load configuration from {}", file.display()))?;

        tracing::debug!(
            path = %file.display(),
            networks = ?config.networks.keys().collect::<Vec<_>>(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Configuration of a network.
    pub fn network(&self, name: &str) -> Result<&NetworkConfig, DeployError> {
        self.networks
            .get(name)
            .ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))
    }
}
