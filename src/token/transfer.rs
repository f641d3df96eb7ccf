use std::sync::Arc;

use ethers::contract::ContractError;
use ethers::providers::{Middleware, MiddlewareError, RpcError};
use ethers::types::{Address, H256, U256};
use tracing::info;

use crate::abis::Erc20;
use crate::error::DeploymentError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub token: Address,
    pub to: Address,
    /// In base units
    pub amount: U256,
}

/// Calls `transfer` on the token from the account signing for `client`.
pub async fn send_transfer<M>(
    client: Arc<M>,
    transfer: &TokenTransfer,
) -> Result<H256, DeploymentError>
where
    M: Middleware + 'static,
    M::Error: 'static,
{
    if transfer.to.is_zero() {
        return Err(DeploymentError::config(
            "refusing to transfer to the zero address",
        ));
    }

    let token = Erc20::new(transfer.token, client);
    let call = token.transfer(transfer.to, transfer.amount);

    let pending = call.send().await.map_err(classify_contract_error)?;
    let tx_hash = *pending;

    info!(?tx_hash, "Transfer submitted");

    Ok(tx_hash)
}

fn classify_contract_error<M>(err: ContractError<M>) -> DeploymentError
where
    M: Middleware + 'static,
    M::Error: 'static,
{
    let error_response = err
        .as_middleware_error()
        .map(MiddlewareError::is_error_response)
        .or_else(|| err.as_provider_error().map(RpcError::is_error_response));

    let rejected = err.is_revert() || error_response == Some(true);
    let reached_node = error_response.is_some();

    let err = eyre::Report::from(err).wrap_err("Sending transfer");

    if rejected {
        DeploymentError::Rejected(err)
    } else if reached_node {
        DeploymentError::Network(err)
    } else {
        DeploymentError::Config(err)
    }
}
