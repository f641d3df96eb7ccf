//! Operations on a token contract that is already deployed.

use std::sync::Arc;

use ethers::providers::{Http, Provider};
use ethers::types::H256;
use eyre::Context;
use tracing::{info, instrument};

use crate::cli::{Args, PrivateKey, ScanTransfersArgs, TransferArgs};
use crate::config::{Config, Endpoint};
use crate::deployment::with_timeout;
use crate::error::DeploymentError;
use crate::ethers_utils;
use crate::units;

pub mod scan;
pub mod transfer;

pub use self::scan::{scan_transfers, LoggedTransfer, TransferScan};
pub use self::transfer::{send_transfer, TokenTransfer};

/// Signs and submits a transfer, resolving to the transaction hash.
///
/// The transfer is not awaited, the hash is enough to follow it up.
#[instrument(skip_all, fields(token = ?cmd.token, to = ?cmd.to))]
pub async fn transfer(
    args: &Args,
    config: &Config,
    cmd: TransferArgs,
) -> Result<H256, DeploymentError> {
    let amount = units::parse_units(&cmd.amount, cmd.decimals)?;
    let timeout = args.timeout()?;

    let endpoint = config.endpoint(args.network.clone(), args.rpc_url.clone())?;
    let private_key = args
        .private_key
        .as_ref()
        .ok_or_else(DeploymentError::missing_key)?;

    let transfer = TokenTransfer {
        token: cmd.token,
        to: cmd.to,
        amount,
    };

    info!(
        network = %endpoint.network,
        amount = %units::format_units(amount, cmd.decimals),
        base_units = %amount,
        "Transferring"
    );

    let submission = transfer_from(&endpoint, private_key, &transfer);

    with_timeout(timeout, submission).await
}

async fn transfer_from(
    endpoint: &Endpoint,
    private_key: &PrivateKey,
    transfer: &TokenTransfer,
) -> Result<H256, DeploymentError> {
    let client =
        ethers_utils::connect(&endpoint.rpc_url, private_key, endpoint.chain_id)
            .await?;

    send_transfer(Arc::new(client), transfer).await
}

/// Collects the ERC20 transfers logged in the requested block range.
#[instrument(skip_all, fields(from_block = cmd.from_block))]
pub async fn scan(
    args: &Args,
    config: &Config,
    cmd: ScanTransfersArgs,
) -> Result<Vec<LoggedTransfer>, DeploymentError> {
    let timeout = args.timeout()?;
    let endpoint = config.endpoint(args.network.clone(), args.rpc_url.clone())?;

    let scan = TransferScan {
        from_block: cmd.from_block,
        to_block: cmd.to_block,
        token: cmd.token,
    };

    with_timeout(timeout, scan_endpoint(&endpoint, &scan)).await
}

async fn scan_endpoint(
    endpoint: &Endpoint,
    scan: &TransferScan,
) -> Result<Vec<LoggedTransfer>, DeploymentError> {
    let provider = Provider::<Http>::try_from(endpoint.rpc_url.as_str())
        .context("Creating provider")
        .map_err(DeploymentError::Config)?;

    info!(network = %endpoint.network, "Scanning");

    scan_transfers(&provider, scan).await
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Command;

    const KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn transfer_args(extra: &[&str]) -> (Args, TransferArgs) {
        let mut argv = vec![
            "token-deployer",
            "transfer",
            "--token",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            "--to",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            // nothing listens here, reaching the network fails the test
            "--rpc-url",
            "http://127.0.0.1:1",
        ];
        argv.extend_from_slice(extra);

        let mut args = Args::parse_from(argv);
        let Some(Command::Transfer(cmd)) = args.command.take() else {
            panic!("expected a transfer");
        };

        (args, cmd)
    }

    #[tokio::test]
    async fn malformed_amount_fails_before_connecting() {
        let (args, cmd) =
            transfer_args(&["--amount", "1.2.3", "--private-key", KEY]);

        let err = transfer(&args, &Config::default(), cmd).await.unwrap_err();

        assert!(matches!(err, DeploymentError::InvalidAmount(_)), "{err:?}");
    }

    #[tokio::test]
    async fn transfer_needs_a_signing_key() {
        let (args, cmd) = transfer_args(&["--amount", "1"]);

        let err = transfer(&args, &Config::default(), cmd).await.unwrap_err();

        assert!(err.to_string().contains("WALLET_KEY"), "{err}");
    }

    #[tokio::test]
    async fn scan_rejects_unknown_networks() {
        let mut args = Args::parse_from([
            "token-deployer",
            "scan-transfers",
            "--from-block",
            "1",
            "--network",
            "mainnet",
        ]);
        let Some(Command::ScanTransfers(cmd)) = args.command.take() else {
            panic!("expected a scan");
        };

        let err = scan(&args, &Config::default(), cmd).await.unwrap_err();

        assert!(matches!(err, DeploymentError::Config(_)), "{err:?}");
    }
}
