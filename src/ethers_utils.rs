use std::sync::Arc;

use ethers::prelude::SignerMiddleware;
use ethers::providers::{
    Http, JsonRpcClient, Middleware, MiddlewareError, PendingTransaction,
    Provider, RpcError,
};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Eip1559TransactionRequest, TransactionReceipt, H256, U256,
};
use ethers::utils::get_contract_address;
use eyre::Context;
use reqwest::Url;
use tracing::{info, instrument, warn};

use crate::artifact::Artifact;
use crate::cli::PrivateKey;
use crate::deployment::{ContractDeployer, DeploymentRequest};
use crate::error::DeploymentError;
use crate::report::ContractDeployment;
use crate::types::ChainId;

pub type RpcSigner = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Connects a signing client to `rpc_url`.
///
/// When `expected_chain_id` is set the node has to report the same chain.
#[instrument(skip_all, fields(%rpc_url))]
pub async fn connect(
    rpc_url: &Url,
    private_key: &PrivateKey,
    expected_chain_id: Option<ChainId>,
) -> Result<RpcSigner, DeploymentError> {
    let provider = Provider::<Http>::try_from(rpc_url.as_str())
        .context("Creating provider")
        .map_err(DeploymentError::Config)?;

    let chain_id = provider
        .get_chainid()
        .await
        .context("Fetching chain id")
        .map_err(DeploymentError::Network)?
        .as_u64();

    if let Some(expected) = expected_chain_id {
        if *expected != chain_id {
            return Err(DeploymentError::config(format!(
                "node reports chain id {chain_id}, expected {expected}"
            )));
        }
    }

    let wallet = private_key.wallet().with_chain_id(chain_id);

    info!(chain_id, deployer = ?wallet.address(), "Connected");

    Ok(SignerMiddleware::new(provider, wallet))
}

/// Address a creation transaction from `deployer` with `nonce` deploys to.
pub fn predicted_address(deployer: Address, nonce: U256) -> Address {
    get_contract_address(deployer, nonce)
}

/// Deploys a compiled [`Artifact`] through any ethers middleware stack.
pub struct ArtifactDeployer<M> {
    client: Arc<M>,
    artifact: Artifact,
    confirmations: usize,
}

impl<M> ArtifactDeployer<M>
where
    M: Middleware + 'static,
    M::Error: 'static,
{
    pub fn new(client: Arc<M>, artifact: Artifact) -> Self {
        Self {
            client,
            artifact,
            confirmations: 1,
        }
    }

    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations;
        self
    }

    #[instrument(
        name = "deploy_artifact",
        skip_all,
        fields(contract = ?self.artifact.contract_name)
    )]
    async fn send(
        &self,
        request: &DeploymentRequest,
    ) -> Result<ContractDeployment, DeploymentError> {
        let data = self
            .artifact
            .creation_code(&request.constructor_args)
            .map_err(DeploymentError::Config)?;

        let tx_request = Eip1559TransactionRequest::new().data(data);
        let mut tx = TypedTransaction::Eip1559(tx_request);

        self.client
            .fill_transaction(&mut tx, None)
            .await
            .map_err(|err| {
                classify_middleware_error(err, "Filling transaction")
            })?;

        let predicted = match (tx.from(), tx.nonce()) {
            (Some(from), Some(nonce)) => Some(predicted_address(*from, *nonce)),
            _ => None,
        };

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|err| {
                classify_middleware_error(err, "Sending transaction")
            })?;

        let tx_hash = *pending;

        info!(?tx_hash, confirmations = self.confirmations, "Awaiting receipt");

        let receipt = confirmed_receipt(pending, self.confirmations).await?;

        check_deployment(receipt, predicted)
    }
}

impl<M> ContractDeployer for ArtifactDeployer<M>
where
    M: Middleware + 'static,
    M::Error: 'static,
{
    async fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> Result<ContractDeployment, DeploymentError> {
        self.send(request).await
    }
}

/// Waits for the contract creation `tx_hash` to gather `confirmations` and
/// checks the receipt.
///
/// `expected` is where the contract should have landed, a different address
/// is only logged.
pub async fn await_deployment<P: JsonRpcClient>(
    provider: &Provider<P>,
    tx_hash: H256,
    confirmations: usize,
    expected: Option<Address>,
) -> Result<ContractDeployment, DeploymentError> {
    info!(?tx_hash, confirmations, "Awaiting confirmations");

    let pending = PendingTransaction::new(tx_hash, provider);
    let receipt = confirmed_receipt(pending, confirmations).await?;

    check_deployment(receipt, expected)
}

async fn confirmed_receipt<P: JsonRpcClient>(
    pending: PendingTransaction<'_, P>,
    confirmations: usize,
) -> Result<TransactionReceipt, DeploymentError> {
    pending
        .confirmations(confirmations)
        .await
        .map_err(|err| {
            let rejected = RpcError::is_error_response(&err);
            let err = eyre::Report::from(err).wrap_err("Awaiting receipt");

            if rejected {
                DeploymentError::Rejected(err)
            } else {
                DeploymentError::Network(err)
            }
        })?
        .ok_or_else(|| {
            DeploymentError::rejected("transaction dropped from the mempool")
        })
}

fn check_deployment(
    receipt: TransactionReceipt,
    expected: Option<Address>,
) -> Result<ContractDeployment, DeploymentError> {
    if receipt.status != Some(1.into()) {
        return Err(DeploymentError::rejected(format!(
            "creation transaction {:?} reverted",
            receipt.transaction_hash
        )));
    }

    let address = receipt.contract_address.ok_or_else(|| {
        DeploymentError::rejected("receipt carries no contract address")
    })?;

    if let Some(expected) = expected.filter(|e| *e != address) {
        warn!(?expected, ?address, "Deployed to an unexpected address");
    }

    Ok(ContractDeployment {
        address,
        deployer: receipt.from,
        transaction_hash: receipt.transaction_hash,
    })
}

/// JSON-RPC error responses mean the node looked at the transaction and
/// refused it, everything else never got that far.
pub fn classify_middleware_error<E>(
    err: E,
    context: &'static str,
) -> DeploymentError
where
    E: MiddlewareError + 'static,
{
    let rejected = err.is_error_response();
    let err = eyre::Report::from(err).wrap_err(context);

    if rejected {
        DeploymentError::Rejected(err)
    } else {
        DeploymentError::Network(err)
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ethers::abi::Token;
    use ethers::providers::{JsonRpcError, MockProvider, MockResponse};
    use ethers::types::{Transaction, U64};

    use super::mock::{mocked, queue_submission, respond};
    use super::*;

    const ARTIFACT: &str = r#"{
        "contractName": "DemoToken",
        "abi": [{
            "inputs": [{ "name": "initialSupply", "type": "uint256" }],
            "stateMutability": "nonpayable",
            "type": "constructor"
        }],
        "bytecode": "0x6080604052"
    }"#;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const DEPLOYER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn supply_request() -> DeploymentRequest {
        DeploymentRequest {
            constructor_args: vec![Token::Uint(
                U256::from(100_000_000u64) * U256::exp10(18),
            )],
        }
    }

    fn deployer(
        provider: Provider<MockProvider>,
    ) -> ArtifactDeployer<Provider<MockProvider>> {
        ArtifactDeployer::new(
            Arc::new(provider),
            Artifact::parse(ARTIFACT).unwrap(),
        )
    }

    fn tx_hash() -> H256 {
        H256::repeat_byte(0x2a)
    }

    fn mined_tx() -> Transaction {
        Transaction {
            hash: tx_hash(),
            block_number: Some(U64::from(10)),
            ..Default::default()
        }
    }

    fn receipt(
        status: u64,
        contract_address: Option<&str>,
    ) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: tx_hash(),
            block_number: Some(U64::from(10)),
            from: DEPLOYER.parse().unwrap(),
            contract_address: contract_address.map(|a| a.parse().unwrap()),
            status: Some(U64::from(status)),
            ..Default::default()
        }
    }

    async fn deploy(
        provider: Provider<MockProvider>,
    ) -> Result<ContractDeployment, DeploymentError> {
        let deployer = deployer(provider);
        let request = supply_request();
        let deployment = deployer.deploy(&request);

        tokio::time::timeout(Duration::from_secs(5), deployment)
            .await
            .expect("deployment should not hang on the mock")
    }

    #[tokio::test]
    async fn unreachable_node_is_a_network_error() {
        // no responses queued: every request fails at the transport
        let (provider, _mock) = mocked();

        let err = deploy(provider).await.unwrap_err();

        assert!(matches!(err, DeploymentError::Network(_)), "{err:?}");
    }

    #[tokio::test]
    async fn node_error_response_is_a_rejection() {
        let (provider, mock) = mocked();

        mock.push_response(MockResponse::Error(JsonRpcError {
            code: -32000,
            message: "insufficient funds for gas * price + value".to_string(),
            data: None,
        }));

        let err = deploy(provider).await.unwrap_err();

        assert!(matches!(err, DeploymentError::Rejected(_)), "{err:?}");
    }

    #[tokio::test]
    async fn arity_mismatch_fails_before_any_request() {
        let (provider, mock) = mocked();

        let err = deployer(provider)
            .deploy(&DeploymentRequest {
                constructor_args: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DeploymentError::Config(_)), "{err:?}");
        assert!(mock.assert_request("eth_getBlockByNumber", ()).is_err());
    }

    #[tokio::test]
    async fn mined_creation_yields_the_receipt_address() {
        let (provider, mock) = mocked();

        respond(&mock, receipt(1, Some(CONTRACT)));
        respond(&mock, mined_tx());
        queue_submission(&mock, tx_hash());

        let deployment = deploy(provider).await.unwrap();

        assert_eq!(deployment.address, CONTRACT.parse::<Address>().unwrap());
        assert_eq!(deployment.deployer, DEPLOYER.parse::<Address>().unwrap());
        assert_eq!(deployment.transaction_hash, tx_hash());
    }

    #[tokio::test]
    async fn reverted_creation_is_a_rejection() {
        let (provider, mock) = mocked();

        respond(&mock, receipt(0, Some(CONTRACT)));
        respond(&mock, mined_tx());
        queue_submission(&mock, tx_hash());

        let err = deploy(provider).await.unwrap_err();

        assert!(matches!(err, DeploymentError::Rejected(_)), "{err:?}");
        assert!(err.to_string().contains("reverted"), "{err}");
    }

    #[tokio::test]
    async fn dropped_transaction_is_a_rejection() {
        let (provider, mock) = mocked();

        // the first lookup plus three retries all come back empty
        for _ in 0..4 {
            respond(&mock, Option::<Transaction>::None);
        }
        queue_submission(&mock, tx_hash());

        let err = deploy(provider).await.unwrap_err();

        assert!(matches!(err, DeploymentError::Rejected(_)), "{err:?}");
        assert!(err.to_string().contains("dropped"), "{err}");
    }

    #[tokio::test]
    async fn waits_for_extra_confirmations() {
        let (provider, mock) = mocked();

        // included in block 10, two confirmations need the head past 11
        respond(&mock, U64::from(12));
        respond(&mock, U64::from(11));
        respond(&mock, receipt(1, Some(CONTRACT)));
        respond(&mock, mined_tx());

        let deployment = await_deployment(&provider, tx_hash(), 2, None)
            .await
            .unwrap();

        assert_eq!(deployment.address, CONTRACT.parse::<Address>().unwrap());

        mock.assert_request("eth_getTransactionByHash", [tx_hash()])
            .unwrap();
        mock.assert_request("eth_getTransactionReceipt", [tx_hash()])
            .unwrap();
        mock.assert_request("eth_blockNumber", ()).unwrap();
        mock.assert_request("eth_blockNumber", ()).unwrap();
    }

    #[test]
    fn receipts_without_an_address_are_rejected() {
        let err = check_deployment(receipt(1, None), None).unwrap_err();

        assert!(matches!(err, DeploymentError::Rejected(_)), "{err:?}");
    }

    #[test]
    fn unexpected_address_still_reports_the_receipt() {
        let expected = predicted_address(DEPLOYER.parse().unwrap(), 7.into());

        let deployment =
            check_deployment(receipt(1, Some(CONTRACT)), Some(expected))
                .unwrap();

        assert_ne!(deployment.address, expected);
        assert_eq!(deployment.address, CONTRACT.parse::<Address>().unwrap());
    }

    #[test]
    fn address_depends_on_nonce_not_arguments() {
        let deployer: Address = DEPLOYER.parse().unwrap();

        let first = predicted_address(deployer, U256::zero());
        let second = predicted_address(deployer, U256::one());

        assert_ne!(first, second);
        assert_eq!(first, predicted_address(deployer, U256::zero()));
        assert_eq!(first, CONTRACT.parse::<Address>().unwrap());
    }
}
