use std::future::Future;
use std::time::Duration;

use ethers::abi::Token;
use ethers::types::U256;
use tracing::{info, instrument, warn};

use crate::error::DeploymentError;
use crate::report::ContractDeployment;
use crate::units;

pub mod deployment_context;

pub use self::deployment_context::DeploymentContext;

/// Everything the creation transaction needs beyond the contract itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRequest {
    pub constructor_args: Vec<Token>,
}

impl DeploymentRequest {
    /// A single `uint256` constructor argument holding the supply in base
    /// units.
    pub fn token_supply(supply: U256) -> Self {
        Self {
            constructor_args: vec![Token::Uint(supply)],
        }
    }

    /// ABI encoding of the arguments as they trail the creation code.
    pub fn encoded_args(&self) -> ethers::types::Bytes {
        ethers::abi::encode(&self.constructor_args).into()
    }
}

pub trait ContractDeployer {
    /// Submits the creation transaction and resolves once it is confirmed.
    async fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> Result<ContractDeployment, DeploymentError>;
}

pub async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, DeploymentError>>,
) -> Result<T, DeploymentError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| DeploymentError::Timeout(timeout))?
}

/// Runs the whole deployment once.
///
/// The supply is converted before `deployer` is touched, so a malformed
/// amount never reaches the network.
#[instrument(
    skip_all,
    fields(network = %context.network, contract = %context.contract)
)]
pub async fn run_deployment(
    context: &DeploymentContext,
    deployer: &impl ContractDeployer,
) -> Result<ContractDeployment, DeploymentError> {
    let supply = units::parse_ether(&context.supply)?;

    info!(
        supply = %units::format_ether(supply),
        base_units = %supply,
        backend = %context.backend,
        "Deploying"
    );

    let request = DeploymentRequest::token_supply(supply);

    let deployment =
        with_timeout(context.timeout, deployer.deploy(&request)).await?;

    info!(
        address = ?deployment.address,
        deployer = ?deployment.deployer,
        tx_hash = ?deployment.transaction_hash,
        "Deployed"
    );

    if context.verify {
        // the contract exists at this point, verification can be redone by hand
        if let Err(err) = verify(context, &deployment, &request).await {
            warn!("Verification failed: {err:?}");
        }
    }

    Ok(deployment)
}

async fn verify(
    context: &DeploymentContext,
    deployment: &ContractDeployment,
    request: &DeploymentRequest,
) -> eyre::Result<()> {
    context
        .forge_verify(deployment.address, request.encoded_args())?
        .run()
        .await
}
