use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, Bytes};
use eyre::ContextCompat;
use reqwest::Url;

use super::{ContractDeployer, DeploymentRequest};
use crate::artifact::Artifact;
use crate::cli::{Args, Backend, PrivateKey};
use crate::config::{Config, Endpoint};
use crate::error::DeploymentError;
use crate::ethers_utils::{self, ArtifactDeployer};
use crate::forge_utils::{
    CompilerSettings, ContractSpec, ForgeCreate, ForgeVerify,
};
use crate::report::ContractDeployment;
use crate::types::ChainId;

/// Settings for a single run, resolved once at startup and never mutated.
#[derive(Debug)]
pub struct DeploymentContext {
    pub network: String,
    pub rpc_url: Url,
    pub chain_id: Option<ChainId>,
    pub private_key: PrivateKey,
    pub etherscan_api_key: Option<String>,
    pub compiler: CompilerSettings,
    pub contract: ContractSpec,
    pub supply: String,
    pub backend: Backend,
    pub artifact: PathBuf,
    pub project_dir: PathBuf,
    pub confirmations: usize,
    pub timeout: Duration,
    pub verify: bool,
}

impl DeploymentContext {
    /// Merges the command line over the settings file, failing on anything
    /// required that is missing.
    pub fn new(args: Args, config: &Config) -> Result<Self, DeploymentError> {
        let timeout = args.timeout()?;

        let Endpoint {
            network,
            rpc_url,
            chain_id,
        } = config.endpoint(args.network, args.rpc_url)?;

        let private_key =
            args.private_key.ok_or_else(DeploymentError::missing_key)?;

        if args.verify && args.etherscan_api_key.is_none() {
            return Err(DeploymentError::config(
                "--verify needs an explorer API key, set ETHERSCAN_KEY",
            ));
        }

        if args.confirmations == 0 {
            return Err(DeploymentError::config(
                "at least one confirmation is required",
            ));
        }

        let artifact = args.artifact.unwrap_or_else(|| {
            Artifact::default_path(&args.project_dir, &args.contract.name)
        });

        Ok(Self {
            network,
            rpc_url,
            chain_id,
            private_key,
            etherscan_api_key: args.etherscan_api_key,
            compiler: CompilerSettings::from(&config.solidity),
            contract: args.contract,
            supply: args.supply,
            backend: args.backend,
            artifact,
            project_dir: args.project_dir,
            confirmations: args.confirmations,
            timeout,
            verify: args.verify,
        })
    }

    pub fn forge_create(&self) -> ForgeCreate {
        ForgeCreate::new(self.contract.clone())
            .with_cwd(&self.project_dir)
            .with_private_key(self.private_key.clone())
            .with_rpc_url(self.rpc_url.to_string())
            .with_compiler(self.compiler.clone())
            .with_confirmations(self.confirmations)
    }

    pub fn forge_verify(
        &self,
        address: Address,
        constructor_args: Bytes,
    ) -> eyre::Result<ForgeVerify> {
        let etherscan_api_key = self
            .etherscan_api_key
            .as_ref()
            .context("Missing etherscan api key")?;

        Ok(ForgeVerify::new(self.contract.clone(), address)
            .with_root(&self.project_dir)
            .with_rpc_url(&self.rpc_url)
            .with_etherscan_api_key(etherscan_api_key)
            .with_compiler(self.compiler.clone())
            .with_constructor_args(constructor_args))
    }

    /// Builds the backend selected on the command line. Nothing here talks
    /// to the network.
    pub async fn deployer(&self) -> Result<Deployer, DeploymentError> {
        match self.backend {
            Backend::Forge => Ok(Deployer::Forge(self.forge_create())),
            Backend::Artifact => {
                let artifact = Artifact::read(&self.artifact).await?;

                Ok(Deployer::Artifact {
                    artifact,
                    rpc_url: self.rpc_url.clone(),
                    private_key: self.private_key.clone(),
                    chain_id: self.chain_id,
                    confirmations: self.confirmations,
                })
            }
        }
    }
}

pub enum Deployer {
    Forge(ForgeCreate),
    /// Connects on first use so the connection counts against the timeout
    Artifact {
        artifact: Artifact,
        rpc_url: Url,
        private_key: PrivateKey,
        chain_id: Option<ChainId>,
        confirmations: usize,
    },
}

impl ContractDeployer for Deployer {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> Result<ContractDeployment, DeploymentError> {
        match self {
            Self::Forge(forge_create) => forge_create.deploy(request).await,
            Self::Artifact {
                artifact,
                rpc_url,
                private_key,
                chain_id,
                confirmations,
            } => {
                let client =
                    ethers_utils::connect(rpc_url, private_key, *chain_id)
                        .await?;

                ArtifactDeployer::new(Arc::new(client), artifact.clone())
                    .with_confirmations(*confirmations)
                    .deploy(request)
                    .await
            }
        }
    }
}
