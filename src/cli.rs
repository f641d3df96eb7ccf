use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use ethers::types::Address;

pub mod private_key;

pub use private_key::PrivateKey;
use reqwest::Url;

use crate::error::DeploymentError;
use crate::forge_utils::ContractSpec;
use crate::units::TOKEN_DECIMALS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, strum::Display)]
#[clap(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Backend {
    /// Compile and deploy through `forge create`
    Forge,
    /// Deploy a precompiled artifact through the JSON-RPC endpoint
    Artifact,
}

/// Deploys the token when no subcommand is given.
#[derive(Debug, Clone, Parser)]
#[clap(rename_all = "kebab-case", version, about)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Option<Command>,

    /// Path to the deployment settings file
    ///
    /// Built-in defaults are used when omitted
    #[clap(short, long, global = true, env = "DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Name of the network in the settings file to talk to
    #[clap(short, long, global = true, env = "NETWORK")]
    pub network: Option<String>,

    /// The RPC Url to use, overrides the network's url
    #[clap(short, long, global = true, env = "RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Private key of the signing account
    #[clap(
        short,
        long,
        global = true,
        env = "WALLET_KEY",
        hide_env_values = true
    )]
    pub private_key: Option<PrivateKey>,

    /// The etherscan API key, only needed with --verify
    #[clap(short, long, env = "ETHERSCAN_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Contract to deploy, 'Name' or 'path/to/File.sol:Name'
    #[clap(long, env = "CONTRACT", default_value = "DemoToken")]
    pub contract: ContractSpec,

    /// Initial token supply in whole tokens, e.g. '100000000' or '1.5'
    #[clap(long, env = "SUPPLY", default_value = "100000000")]
    pub supply: String,

    #[clap(short, long, env = "BACKEND", default_value = "forge")]
    pub backend: Backend,

    /// Path to the compiled artifact, artifact backend only
    ///
    /// Defaults to the Hardhat layout under the project directory
    #[clap(long, env = "ARTIFACT")]
    pub artifact: Option<PathBuf>,

    /// Root of the contract project
    #[clap(long, env = "PROJECT_DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Number of confirmations to wait for
    #[clap(long, env = "CONFIRMATIONS", default_value_t = 1)]
    pub confirmations: usize,

    /// Give up after this many seconds
    #[clap(long, global = true, env = "TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    /// Verify the contract source on the block explorer after deploying
    #[clap(long, env = "VERIFY")]
    pub verify: bool,
}

impl Args {
    pub fn timeout(&self) -> Result<Duration, DeploymentError> {
        if self.timeout_secs == 0 {
            return Err(DeploymentError::config("timeout must be positive"));
        }

        Ok(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Transfer tokens from the signing account
    Transfer(TransferArgs),
    /// List the ERC20 transfers logged from a block onwards
    ScanTransfers(ScanTransfersArgs),
}

#[derive(Debug, Clone, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct TransferArgs {
    /// Address of the token contract
    #[clap(long, env = "TOKEN")]
    pub token: Address,

    /// Receiving account
    #[clap(long)]
    pub to: Address,

    /// Amount in whole tokens, e.g. '250' or '0.5'
    #[clap(long)]
    pub amount: String,

    /// Decimals of the token
    #[clap(long, default_value_t = TOKEN_DECIMALS)]
    pub decimals: u32,
}

#[derive(Debug, Clone, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct ScanTransfersArgs {
    /// First block to scan
    #[clap(long)]
    pub from_block: u64,

    /// Last block to scan, the latest block when omitted
    #[clap(long)]
    pub to_block: Option<u64>,

    /// Only report transfers of this token
    #[clap(long, env = "TOKEN")]
    pub token: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_token_deployment() {
        let args = Args::parse_from(["token-deployer"]);

        assert_eq!(args.contract.to_string(), "DemoToken");
        assert_eq!(args.supply, "100000000");
        assert_eq!(args.backend, Backend::Forge);
        assert_eq!(args.confirmations, 1);
        assert_eq!(args.timeout_secs, 300);
        assert!(!args.verify);
    }

    #[test]
    fn backend_display_is_kebab_case() {
        assert_eq!(Backend::Artifact.to_string(), "artifact");

        let args =
            Args::parse_from(["token-deployer", "--backend", "artifact"]);
        assert_eq!(args.backend, Backend::Artifact);
    }

    #[test]
    fn no_subcommand_means_deploy() {
        let args = Args::parse_from(["token-deployer"]);

        assert!(args.command.is_none());
    }

    #[test]
    fn parses_the_transfer_subcommand() -> eyre::Result<()> {
        let args = Args::try_parse_from([
            "token-deployer",
            "transfer",
            "--token",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            "--to",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "--amount",
            "12.5",
            "--rpc-url",
            "http://127.0.0.1:8545",
        ])?;

        let Some(Command::Transfer(transfer)) = args.command else {
            panic!("expected a transfer");
        };

        assert_eq!(
            transfer.token,
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse()?
        );
        assert_eq!(transfer.amount, "12.5");
        assert_eq!(transfer.decimals, 18);
        // global flags are accepted after the subcommand
        assert_eq!(
            args.rpc_url.map(String::from).as_deref(),
            Some("http://127.0.0.1:8545/")
        );

        Ok(())
    }

    #[test]
    fn parses_the_scan_subcommand() -> eyre::Result<()> {
        let args = Args::try_parse_from([
            "token-deployer",
            "scan-transfers",
            "--from-block",
            "9933867",
        ])?;

        let Some(Command::ScanTransfers(scan)) = args.command else {
            panic!("expected a scan");
        };

        assert_eq!(scan.from_block, 9_933_867);
        assert_eq!(scan.to_block, None);

        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let args = Args::parse_from(["token-deployer", "--timeout-secs", "0"]);

        assert!(matches!(args.timeout(), Err(DeploymentError::Config(_))));
    }
}
