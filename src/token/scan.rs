use std::fmt;

use ethers::abi::{ParamType, Token};
use ethers::contract::EthEvent;
use ethers::providers::Middleware;
use ethers::types::{Address, Filter, Log, H256};
use ethers::utils::to_checksum;
use tracing::info;

use crate::abis::TransferFilter;
use crate::error::DeploymentError;
use crate::ethers_utils::classify_middleware_error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferScan {
    pub from_block: u64,
    /// Latest block when unset
    pub to_block: Option<u64>,
    pub token: Option<Address>,
}

impl TransferScan {
    pub fn filter(&self) -> Filter {
        let mut filter = Filter::new()
            .from_block(self.from_block)
            .topic0(TransferFilter::signature());

        if let Some(to_block) = self.to_block {
            filter = filter.to_block(to_block);
        }

        if let Some(token) = self.token {
            filter = filter.address(token);
        }

        filter
    }
}

/// A `Transfer` event emitted by an ERC20 token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedTransfer {
    pub tx_hash: Option<H256>,
    pub token: Address,
    pub transfer: TransferFilter,
}

impl fmt::Display for LoggedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tx_hash {
            Some(tx_hash) => write!(f, "tx:{tx_hash:?} ")?,
            None => write!(f, "tx:pending ")?,
        }

        write!(
            f,
            "token:{} from {} to {} amount:{}",
            to_checksum(&self.token, None),
            to_checksum(&self.transfer.from, None),
            to_checksum(&self.transfer.to, None),
            self.transfer.value
        )
    }
}

pub async fn scan_transfers<M>(
    client: &M,
    scan: &TransferScan,
) -> Result<Vec<LoggedTransfer>, DeploymentError>
where
    M: Middleware + 'static,
    M::Error: 'static,
{
    let logs = client
        .get_logs(&scan.filter())
        .await
        .map_err(|err| classify_middleware_error(err, "Fetching logs"))?;

    let transfers: Vec<_> = logs.iter().filter_map(decode_transfer).collect();

    info!(logs = logs.len(), transfers = transfers.len(), "Scanned");

    Ok(transfers)
}

/// Decodes an ERC20 `Transfer` log.
///
/// ERC721 shares the event signature but indexes the token id as a fourth
/// topic, those logs are skipped along with anything malformed.
pub fn decode_transfer(log: &Log) -> Option<LoggedTransfer> {
    let [signature, from, to] = log.topics.as_slice() else {
        return None;
    };

    if *signature != TransferFilter::signature() {
        return None;
    }

    let from = topic_address(from)?;
    let to = topic_address(to)?;

    let tokens = ethers::abi::decode(&[ParamType::Uint(256)], &log.data).ok()?;
    let [Token::Uint(value)] = tokens.as_slice() else {
        return None;
    };

    Some(LoggedTransfer {
        tx_hash: log.transaction_hash,
        token: log.address,
        transfer: TransferFilter {
            from,
            to,
            value: *value,
        },
    })
}

/// Indexed addresses are left padded with zeros to 32 bytes.
fn topic_address(topic: &H256) -> Option<Address> {
    let (padding, address) = topic.as_bytes().split_at(12);

    padding
        .iter()
        .all(|b| *b == 0)
        .then(|| Address::from_slice(address))
}

#[cfg(test)]
mod tests {
    use ethers::abi::encode;
    use ethers::types::{Bytes, U256};

    use super::*;
    use crate::ethers_utils::mock::{mocked, respond};

    const TOKEN: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const FROM: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const TO: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn topic(address: &str) -> H256 {
        H256::from(address.parse::<Address>().unwrap())
    }

    fn transfer_log(value: u64) -> Log {
        Log {
            address: TOKEN.parse().unwrap(),
            topics: vec![TransferFilter::signature(), topic(FROM), topic(TO)],
            data: Bytes::from(encode(&[Token::Uint(value.into())])),
            transaction_hash: Some(H256::repeat_byte(0x42)),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_erc20_transfers() {
        let transfer = decode_transfer(&transfer_log(250)).unwrap();

        assert_eq!(transfer.token, TOKEN.parse::<Address>().unwrap());
        assert_eq!(transfer.transfer.from, FROM.parse::<Address>().unwrap());
        assert_eq!(transfer.transfer.to, TO.parse::<Address>().unwrap());
        assert_eq!(transfer.transfer.value, U256::from(250));

        assert_eq!(
            transfer.to_string(),
            format!(
                "tx:{:?} token:{TOKEN} from {FROM} to {TO} amount:250",
                H256::repeat_byte(0x42)
            )
        );
    }

    #[test]
    fn skips_logs_that_are_not_erc20_transfers() {
        // ERC721 indexes the token id
        let mut nft = transfer_log(0);
        nft.topics.push(H256::from_low_u64_be(7));
        nft.data = Bytes::default();
        assert_eq!(decode_transfer(&nft), None);

        let mut approval = transfer_log(1);
        approval.topics[0] = H256::repeat_byte(0x8c);
        assert_eq!(decode_transfer(&approval), None);

        let mut dirty_padding = transfer_log(1);
        dirty_padding.topics[1].0[0] = 1;
        assert_eq!(decode_transfer(&dirty_padding), None);

        let mut short_data = transfer_log(1);
        short_data.data = Bytes::from(vec![0u8; 31]);
        assert_eq!(decode_transfer(&short_data), None);
    }

    #[test]
    fn filter_narrows_to_the_token_and_range() {
        let scan = TransferScan {
            from_block: 100,
            to_block: Some(200),
            token: Some(TOKEN.parse().unwrap()),
        };

        let filter = serde_json::to_value(scan.filter()).unwrap();

        assert_eq!(filter["fromBlock"], "0x64");
        assert_eq!(filter["toBlock"], "0xc8");
        assert_eq!(filter["address"], TOKEN.to_lowercase().as_str());
        assert_eq!(
            filter["topics"][0],
            format!("{:?}", TransferFilter::signature()).as_str()
        );
    }

    #[tokio::test]
    async fn scan_keeps_only_decodable_transfers() {
        let (provider, mock) = mocked();
        let scan = TransferScan {
            from_block: 9_933_867,
            to_block: None,
            token: None,
        };

        let mut nft = transfer_log(0);
        nft.topics.push(H256::from_low_u64_be(7));

        respond(&mock, vec![transfer_log(5), nft, transfer_log(6)]);

        let transfers = scan_transfers(&provider, &scan).await.unwrap();

        let values: Vec<_> =
            transfers.iter().map(|t| t.transfer.value.as_u64()).collect();
        assert_eq!(values, vec![5, 6]);

        mock.assert_request("eth_getLogs", [scan.filter()]).unwrap();
    }
}
