use std::path::{Path, PathBuf};

use ethers::abi::{Abi, Token};
use ethers::types::Bytes;
use eyre::Context;
use serde::Deserialize;

use crate::error::DeploymentError;

/// Compiled contract: ABI plus creation bytecode.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    #[serde(default, alias = "contractName")]
    pub contract_name: Option<String>,
    pub abi: Abi,
    #[serde(deserialize_with = "bytecode::deserialize")]
    pub bytecode: Bytes,
}

impl Artifact {
    /// Where hardhat places the artifact of `name` declared in `name.sol`.
    pub fn default_path(project_dir: &Path, name: &str) -> PathBuf {
        project_dir
            .join("artifacts")
            .join("contracts")
            .join(format!("{name}.sol"))
            .join(format!("{name}.json"))
    }

    pub async fn read(path: impl AsRef<Path>) -> Result<Self, DeploymentError> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Reading artifact {}", path.display()))
            .map_err(DeploymentError::Config)?;

        Self::parse(&content)
            .with_context(|| format!("Parsing artifact {}", path.display()))
            .map_err(DeploymentError::Config)
    }

    pub fn parse(content: &str) -> eyre::Result<Self> {
        let artifact: Self = serde_json::from_str(content)?;

        if artifact.bytecode.is_empty() {
            eyre::bail!("artifact has no creation bytecode, is it abstract?");
        }

        Ok(artifact)
    }

    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn creation_code(&self, args: &[Token]) -> eyre::Result<Bytes> {
        let code = self.bytecode.to_vec();

        let data = match self.abi.constructor() {
            Some(constructor) => constructor
                .encode_input(code, args)
                .context("Encoding constructor arguments")?,
            None if args.is_empty() => code,
            None => eyre::bail!(
                "contract has no constructor but {} arguments were given",
                args.len()
            ),
        };

        Ok(data.into())
    }
}

mod bytecode {
    use ethers::types::Bytes;
    use serde::{Deserialize, Deserializer};

    /// Hardhat writes the bytecode as a hex string, foundry nests it.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Bytecode {
        Hex(Bytes),
        Object { object: Bytes },
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Bytecode::deserialize(deserializer)? {
            Bytecode::Hex(bytes) => bytes,
            Bytecode::Object { object } => object,
        })
    }
}
