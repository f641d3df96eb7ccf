use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ethers::abi::Token;

#[derive(Debug, Clone)]
pub struct ContractSpec {
    pub path: Option<PathBuf>,
    pub name: String,
}

/// Accepts `Name` or `path/to/File.sol:Name`.
impl FromStr for ContractSpec {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, name) = match s.rsplit_once(':') {
            Some((path, name)) => (Some(PathBuf::from(path)), name),
            None => (None, s),
        };

        let empty_path =
            path.as_ref().is_some_and(|p| p.as_os_str().is_empty());

        if name.is_empty() || empty_path {
            eyre::bail!(
                "invalid contract '{s}', expected 'Name' or 'path:Name'"
            );
        }

        Ok(Self {
            path,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ContractSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = self.path.as_deref() {
            write!(f, "{}:{}", path.display(), self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Renders a constructor argument the way `forge create --constructor-args`
/// expects it on the command line.
pub fn token_cli_arg(token: &Token) -> eyre::Result<String> {
    let arg = match token {
        Token::Uint(value) => value.to_string(),
        Token::Int(value) => {
            ethers::types::I256::from_raw(*value).to_string()
        }
        Token::Address(address) => format!("{address:?}"),
        Token::Bool(value) => value.to_string(),
        Token::String(value) => value.clone(),
        Token::Bytes(bytes) | Token::FixedBytes(bytes) => {
            format!("0x{}", hex::encode(bytes))
        }
        other => eyre::bail!("unsupported constructor argument {other:?}"),
    };

    Ok(arg)
}
