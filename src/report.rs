use std::fmt;
use std::io::Write;

use ethers::types::{Address, H256};
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};

use crate::error::DeploymentError;
use crate::forge_utils::ForgeOutput;
use crate::token::LoggedTransfer;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ContractDeployment {
    pub address: Address,
    pub deployer: Address,
    pub transaction_hash: H256,
}

impl From<ForgeOutput> for ContractDeployment {
    fn from(value: ForgeOutput) -> Self {
        Self {
            address: value.deployed_to,
            deployer: value.deployer,
            transaction_hash: value.transaction_hash,
        }
    }
}

/// Only the checksummed address, this is what scripts read from stdout.
impl fmt::Display for ContractDeployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_checksum(&self.address, None))
    }
}

/// What a successful run prints, one per subcommand.
#[derive(Debug)]
pub enum Outcome {
    Deployed(ContractDeployment),
    Transferred(H256),
    Scanned(Vec<LoggedTransfer>),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployed(deployment) => fmt::Display::fmt(deployment, f),
            Self::Transferred(tx_hash) => write!(f, "{tx_hash:?}"),
            Self::Scanned(transfers) => {
                for (i, transfer) in transfers.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{transfer}")?;
                }
                Ok(())
            }
        }
    }
}

/// Writes the outcome of a run and returns the process exit code.
///
/// On success the rendered outcome is the only thing written to `out`.
/// Failures leave `out` untouched and go to `diagnostics` in full, whatever
/// the log filter is.
pub fn finish<T: fmt::Display>(
    outcome: Result<T, DeploymentError>,
    out: &mut impl Write,
    diagnostics: &mut impl Write,
) -> i32 {
    let rendered = match outcome {
        Ok(value) => value.to_string(),
        Err(err) => {
            let report = eyre::Report::from(err);
            // nowhere left to report a failing stderr
            let _ = writeln!(diagnostics, "Error: {report:?}");
            return EXIT_FAILURE;
        }
    };

    if rendered.is_empty() {
        return EXIT_SUCCESS;
    }

    let written = writeln!(out, "{rendered}").and_then(|()| out.flush());

    match written {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            let _ = writeln!(diagnostics, "Error: writing the result: {err}");
            EXIT_FAILURE
        }
    }
}
