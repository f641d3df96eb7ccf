pub mod common;
pub mod create;
pub mod verify;

pub use self::common::*;
pub use self::create::*;
pub use self::verify::*;

/// Compiler flags shared by `forge create` and `forge verify-contract`.
#[derive(Debug, Clone)]
pub struct CompilerSettings {
    pub solc_version: String,
    /// `None` when the optimizer is disabled
    pub optimizer_runs: Option<crate::types::OptimizerRuns>,
}

impl From<&crate::config::SolidityConfig> for CompilerSettings {
    fn from(value: &crate::config::SolidityConfig) -> Self {
        Self {
            solc_version: value.version.clone(),
            optimizer_runs: value
                .optimizer
                .enabled
                .then_some(value.optimizer.runs),
        }
    }
}
