use std::path::{Path, PathBuf};

use ethers::providers::{Http, Provider};
use ethers::types::{Address, H256};
use eyre::{Context, ContextCompat};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, instrument};

use super::common::{token_cli_arg, ContractSpec};
use super::CompilerSettings;
use crate::cli::PrivateKey;
use crate::deployment::{ContractDeployer, DeploymentRequest};
use crate::error::DeploymentError;
use crate::ethers_utils;
use crate::report::ContractDeployment;

#[derive(Debug)]
pub struct ForgeCreate {
    cwd: Option<PathBuf>,
    pub(crate) contract_spec: ContractSpec,
    private_key: Option<PrivateKey>,
    rpc_url: Option<String>,
    compiler: Option<CompilerSettings>,
    pub(crate) confirmations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeOutput {
    pub deployer: Address,
    pub deployed_to: Address,
    pub transaction_hash: H256,
}

impl ForgeCreate {
    pub fn new(contract_spec: ContractSpec) -> Self {
        Self {
            cwd: None,
            contract_spec,
            private_key: None,
            rpc_url: None,
            compiler: None,
            confirmations: 1,
        }
    }

    pub fn with_cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_owned());
        self
    }

    pub fn with_private_key(mut self, private_key: PrivateKey) -> Self {
        self.private_key = Some(private_key);
        self
    }

    pub fn with_rpc_url(mut self, rpc_url: String) -> Self {
        self.rpc_url = Some(rpc_url);
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerSettings) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// `forge create --broadcast` returns after the first confirmation, any
    /// beyond that are awaited over JSON-RPC.
    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations;
        self
    }

    fn command(&self, request: &DeploymentRequest) -> eyre::Result<Command> {
        let mut cmd = Command::new("forge");
        cmd.arg("create");

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.arg(self.contract_spec.to_string());

        if let Some(private_key) = &self.private_key {
            cmd.arg("--private-key");
            cmd.arg(format!("{private_key:#}"));
        }

        if let Some(rpc_url) = &self.rpc_url {
            cmd.arg("--rpc-url");
            cmd.arg(rpc_url);
        }

        if let Some(compiler) = &self.compiler {
            cmd.arg("--use");
            cmd.arg(&compiler.solc_version);

            if let Some(runs) = compiler.optimizer_runs {
                cmd.arg("--optimize");
                cmd.arg("--optimizer-runs");
                cmd.arg(runs.to_string());
            }
        }

        // recent forge versions only simulate without it
        cmd.arg("--broadcast");
        cmd.arg("--json");

        // must come last, forge reads every following value as an argument
        if !request.constructor_args.is_empty() {
            cmd.arg("--constructor-args");

            for token in &request.constructor_args {
                cmd.arg(token_cli_arg(token)?);
            }
        }

        cmd.kill_on_drop(true);

        Ok(cmd)
    }

    #[instrument(
        name = "forge_create",
        skip_all,
        fields(contract = %self.contract_spec)
    )]
    pub async fn run(
        &self,
        request: &DeploymentRequest,
    ) -> Result<ForgeOutput, DeploymentError> {
        let mut cmd = self.command(request).map_err(DeploymentError::Config)?;

        info!(
            cwd = ?self.cwd,
            args = request.constructor_args.len(),
            "Creating contract"
        );

        let output = cmd
            .output()
            .await
            .context("Launching forge, is foundry installed?")
            .map_err(DeploymentError::Config)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let s = strip_non_json(&stdout);

        let output: ForgeOutput = serde_json::from_str(s)
            .with_context(|| format!("Parsing forge create output: {s}"))
            .map_err(DeploymentError::Network)?;

        info!("Created: {output:?}");

        Ok(output)
    }

    fn provider(&self) -> eyre::Result<Provider<Http>> {
        let rpc_url = self.rpc_url.as_deref().context("Missing rpc url")?;

        Ok(Provider::try_from(rpc_url)?)
    }
}

impl ContractDeployer for ForgeCreate {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> Result<ContractDeployment, DeploymentError> {
        let output = self.run(request).await?;

        if self.confirmations <= 1 {
            return Ok(output.into());
        }

        let provider = self.provider().map_err(DeploymentError::Config)?;

        ethers_utils::await_deployment(
            &provider,
            output.transaction_hash,
            self.confirmations,
            Some(output.deployed_to),
        )
        .await
    }
}

/// Chain-level failures show up as node errors echoed by forge, anything
/// else is treated as the endpoint or the toolchain misbehaving.
fn classify_failure(stderr: &str) -> DeploymentError {
    const REJECTIONS: &[&str] =
        &["revert", "insufficient funds", "nonce too low", "underpriced"];

    let lowercase = stderr.to_lowercase();
    let err = eyre::eyre!("forge create failed: {}", stderr.trim());

    if REJECTIONS.iter().any(|r| lowercase.contains(r)) {
        DeploymentError::Rejected(err)
    } else {
        DeploymentError::Network(err)
    }
}

fn strip_non_json(s: &str) -> &str {
    let s = match s.find('{') {
        Some(first_opening_brace) => &s[first_opening_brace..],
        None => s,
    };

    if let Some(last_closing_brace) = s.rfind('}') {
        &s[..=last_closing_brace]
    } else {
        s
    }
}
