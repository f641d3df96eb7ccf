use std::collections::HashMap;
use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::DeploymentError;
use crate::serde_utils;
use crate::types::{ChainId, OptimizerRuns};

pub const DEFAULT_NETWORK: &str = "goerli";
pub const DEFAULT_SOLC_VERSION: &str = "0.8.18";
pub const DEFAULT_OPTIMIZER_RUNS: OptimizerRuns = OptimizerRuns(100_000);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub solidity: SolidityConfig,
    #[serde(default = "default_network")]
    pub default_network: String,
    #[serde(default = "default_networks")]
    pub networks: HashMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolidityConfig {
    #[serde(default = "default_solc_version")]
    pub version: String,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_optimizer_runs")]
    pub runs: OptimizerRuns,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub url: String,
    /// When set the chain id reported by the node must match
    #[serde(default)]
    pub chain_id: Option<ChainId>,
}

/// The node a run talks to, after command line overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub network: String,
    pub rpc_url: Url,
    pub chain_id: Option<ChainId>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solidity: SolidityConfig::default(),
            default_network: default_network(),
            networks: default_networks(),
        }
    }
}

impl Default for SolidityConfig {
    fn default() -> Self {
        Self {
            version: default_solc_version(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            runs: DEFAULT_OPTIMIZER_RUNS,
        }
    }
}

impl Config {
    /// Reads the settings file, or falls back to the built-in settings.
    pub async fn load(path: Option<&Path>) -> Result<Self, DeploymentError> {
        match path {
            Some(path) => serde_utils::read_deserialize(path)
                .await
                .map_err(DeploymentError::Config),
            None => Ok(Self::default()),
        }
    }

    pub fn network(
        &self,
        name: &str,
    ) -> Result<&NetworkConfig, DeploymentError> {
        self.networks.get(name).ok_or_else(|| {
            let mut known: Vec<_> = self.networks.keys().cloned().collect();
            known.sort();

            DeploymentError::config(format!(
                "unknown network '{name}', known networks: [{}]",
                known.join(", ")
            ))
        })
    }

    /// Picks the network, falling back to `default_network`.
    ///
    /// An explicit `rpc_url` wins over the network's url but the network's
    /// chain id, if it is known, still applies.
    pub fn endpoint(
        &self,
        network: Option<String>,
        rpc_url: Option<Url>,
    ) -> Result<Endpoint, DeploymentError> {
        let network = network.unwrap_or_else(|| self.default_network.clone());

        let (rpc_url, chain_id) = match rpc_url {
            Some(rpc_url) => {
                let chain_id = self
                    .networks
                    .get(&network)
                    .and_then(|network| network.chain_id);

                (rpc_url, chain_id)
            }
            None => {
                let network_config = self.network(&network)?;

                let rpc_url = network_config.url.parse().map_err(|err| {
                    DeploymentError::config(format!(
                        "network '{network}' has an invalid url: {err}"
                    ))
                })?;

                (rpc_url, network_config.chain_id)
            }
        };

        Ok(Endpoint {
            network,
            rpc_url,
            chain_id,
        })
    }
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_networks() -> HashMap<String, NetworkConfig> {
    let mut networks = HashMap::new();

    networks.insert(
        DEFAULT_NETWORK.to_string(),
        NetworkConfig {
            url: "https://rpc.ankr.com/eth_goerli".to_string(),
            chain_id: Some(ChainId(5)),
        },
    );

    networks
}

fn default_solc_version() -> String {
    DEFAULT_SOLC_VERSION.to_string()
}

fn default_optimizer_runs() -> OptimizerRuns {
    DEFAULT_OPTIMIZER_RUNS
}

fn default_true() -> bool {
    true
}
