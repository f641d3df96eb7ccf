use std::path::PathBuf;

use ethers::types::{Address, Bytes};
use eyre::ContextCompat;
use tokio::process::Command;
use tracing::{info, instrument};

use super::{CompilerSettings, ContractSpec};

pub struct ForgeVerify {
    spec: ContractSpec,
    address: Address,
    root: Option<PathBuf>,
    rpc_url: Option<String>,
    etherscan_api_key: Option<String>,
    compiler: Option<CompilerSettings>,
    constructor_args: Option<Bytes>,
}

impl ForgeVerify {
    pub fn new(spec: ContractSpec, address: Address) -> Self {
        Self {
            spec,
            address,
            root: None,
            rpc_url: None,
            etherscan_api_key: None,
            compiler: None,
            constructor_args: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_rpc_url(mut self, rpc_url: impl ToString) -> Self {
        self.rpc_url = Some(rpc_url.to_string());
        self
    }

    pub fn with_etherscan_api_key(
        mut self,
        etherscan_api_key: impl ToString,
    ) -> Self {
        self.etherscan_api_key = Some(etherscan_api_key.to_string());
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerSettings) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// ABI-encoded constructor arguments, without the creation code
    pub fn with_constructor_args(mut self, constructor_args: Bytes) -> Self {
        self.constructor_args = Some(constructor_args);
        self
    }

    fn command(&self) -> eyre::Result<Command> {
        let mut cmd = Command::new("forge");
        cmd.arg("verify-contract");

        cmd.arg("--watch");

        let root = self.root.as_ref().context("Missing root")?;

        cmd.arg("--root");
        cmd.arg(root);

        let rpc_url = self.rpc_url.as_ref().context("Missing rpc url")?;

        cmd.arg("--rpc-url");
        cmd.arg(rpc_url);

        let etherscan_api_key = self
            .etherscan_api_key
            .as_ref()
            .context("Missing etherscan api key")?;

        cmd.arg("--etherscan-api-key");
        cmd.arg(etherscan_api_key);

        if let Some(compiler) = &self.compiler {
            cmd.arg("--compiler-version");
            cmd.arg(format!("v{}", compiler.solc_version));

            if let Some(runs) = compiler.optimizer_runs {
                cmd.arg("--num-of-optimizations");
                cmd.arg(runs.to_string());
            }
        }

        if let Some(constructor_args) = &self.constructor_args {
            cmd.arg("--constructor-args");
            cmd.arg(format!("{constructor_args}"));
        }

        cmd.arg(format!("{:?}", self.address));
        cmd.arg(self.spec.to_string());

        cmd.kill_on_drop(true);

        Ok(cmd)
    }

    #[instrument(
        name = "forge_verify",
        skip_all,
        fields(address = ?self.address)
    )]
    pub async fn run(&self) -> eyre::Result<()> {
        let mut cmd = self.command()?;

        info!("Verifying {} at {:?}", self.spec, self.address);

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eyre::bail!("forge verify failed: {}", stderr);
        }

        Ok(())
    }
}
