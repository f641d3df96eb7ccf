use std::time::Duration;

use thiserror::Error;

use crate::units::AmountError;

/// Every way a run can fail.
///
/// The variants only drive the log message, all of them end the process
/// with the same exit status.
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("invalid token amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("invalid configuration: {0:#}")]
    Config(eyre::Report),

    #[error("network error: {0:#}")]
    Network(eyre::Report),

    #[error("rejected by the chain: {0:#}")]
    Rejected(eyre::Report),

    #[error("did not complete within {0:?}")]
    Timeout(Duration),
}

impl DeploymentError {
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(eyre::eyre!("{msg}"))
    }

    pub fn missing_key() -> Self {
        Self::config(
            "missing signing key, set WALLET_KEY or pass --private-key",
        )
    }

    pub fn rejected(msg: impl std::fmt::Display) -> Self {
        Self::Rejected(eyre::eyre!("{msg}"))
    }
}
