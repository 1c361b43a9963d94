//! Block, log and filter records.
//!
//! All records (de)serialize in the Ethereum JSON-RPC shape: camelCase field
//! names and `0x`-prefixed hex quantities.

use serde::{Deserialize, Serialize};

use crate::quantity;

// ─── Block ────────────────────────────────────────────────────────────────────

/// The parent hash carried by a chain's first block.
pub const GENESIS_PARENT_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

/// The fields of a block header the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block number (height).
    #[serde(with = "quantity")]
    pub number: u64,
    /// Block hash (`0x…`).
    pub hash: String,
    /// Parent block hash (`0x…`).
    pub parent_hash: String,
    /// Unix timestamp of the block, if the provider returned one.
    #[serde(
        default,
        with = "quantity::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<u64>,
}

impl Block {
    pub fn new(number: u64, hash: impl Into<String>, parent_hash: impl Into<String>) -> Self {
        Self {
            number,
            hash: hash.into(),
            parent_hash: parent_hash.into(),
            timestamp: None,
        }
    }

    /// Returns `true` if this block's parent is the all-zero hash.
    pub fn has_genesis_parent(&self) -> bool {
        is_zero_hash(&self.parent_hash)
    }

    /// Returns `true` if `parent` is the direct parent of `self`.
    pub fn extends(&self, parent: &Block) -> bool {
        self.parent_hash == parent.hash
    }
}

fn is_zero_hash(hash: &str) -> bool {
    let digits = hash.strip_prefix("0x").unwrap_or(hash);
    !digits.is_empty() && digits.bytes().all(|b| b == b'0')
}

// ─── Log ──────────────────────────────────────────────────────────────────────

/// An event log as returned by `eth_getLogs`.
///
/// Only `block_number`, `block_hash` and `log_index` matter to reconciliation;
/// the rest is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    #[serde(with = "quantity")]
    pub block_number: u64,
    pub block_hash: String,
    /// Position of the log within its block.
    #[serde(with = "quantity")]
    pub log_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(
        default,
        with = "quantity::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_index: Option<u64>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
}

impl Log {
    /// A log with empty payload fields.
    pub fn new(block_number: u64, block_hash: impl Into<String>, log_index: u64) -> Self {
        Self {
            block_number,
            block_hash: block_hash.into(),
            log_index,
            transaction_hash: None,
            transaction_index: None,
            address: String::new(),
            topics: vec![],
            data: String::new(),
            removed: None,
        }
    }

    /// The key two filters returning the same log agree on.
    pub fn identity(&self) -> (&str, u64) {
        (&self.block_hash, self.log_index)
    }
}

// ─── Filter ───────────────────────────────────────────────────────────────────

/// One topic position of a log filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicFilter {
    /// `null`: any topic matches.
    #[default]
    Any,
    /// A single topic value.
    Exact(String),
    /// Any of the listed topic values.
    OneOf(Vec<String>),
}

/// Address and topic constraints for a log fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Only logs from this contract address (`None` = all addresses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Positional topic constraints (empty = all events).
    #[serde(default)]
    pub topics: Vec<TopicFilter>,
}

impl Filter {
    /// Create a filter for a single contract address.
    pub fn address(addr: impl Into<String>) -> Self {
        Self {
            address: Some(addr.into()),
            ..Default::default()
        }
    }

    /// Append a topic constraint for the next topic position.
    pub fn topic(mut self, topic: TopicFilter) -> Self {
        self.topics.push(topic);
        self
    }

    /// Scope this filter to a single block.
    pub fn for_block(&self, block_hash: impl Into<String>) -> FilterOptions {
        FilterOptions {
            block_hash: block_hash.into(),
            address: self.address.clone(),
            topics: self.topics.clone(),
        }
    }

    /// Returns `true` if `log` satisfies the address and topic constraints.
    pub fn matches(&self, log: &Log) -> bool {
        let address_ok = self
            .address
            .as_ref()
            .map_or(true, |a| a.eq_ignore_ascii_case(&log.address));
        address_ok
            && self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
                TopicFilter::Any => true,
                TopicFilter::Exact(t) => log.topics.get(i).is_some_and(|got| got.eq_ignore_ascii_case(t)),
                TopicFilter::OneOf(ts) => log
                    .topics
                    .get(i)
                    .is_some_and(|got| ts.iter().any(|t| got.eq_ignore_ascii_case(t))),
            })
    }
}

/// A filter scoped to one block, as handed to the log source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub block_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub topics: Vec<TopicFilter>,
}

impl FilterOptions {
    /// The unscoped filter this was built from.
    pub fn filter(&self) -> Filter {
        Filter {
            address: self.address.clone(),
            topics: self.topics.clone(),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_parent_detected() {
        let genesis = Block::new(0, "0xaaa", GENESIS_PARENT_HASH);
        assert!(genesis.has_genesis_parent());
        assert!(Block::new(0, "0xaaa", "0x0").has_genesis_parent());
        assert!(!Block::new(1, "0xbbb", "0xaaa").has_genesis_parent());
        assert!(!Block::new(1, "0xbbb", "0x").has_genesis_parent());
    }

    #[test]
    fn block_extends_parent() {
        let parent = Block::new(100, "0xaaa", "0x999");
        let child = Block::new(101, "0xbbb", "0xaaa");
        assert!(child.extends(&parent));
        assert!(!parent.extends(&child));
    }

    #[test]
    fn block_from_rpc_json() {
        let block: Block = serde_json::from_str(
            r#"{"number":"0x7777","hash":"0xb1","parentHash":"0xb0","timestamp":"0x5f5e100","miner":"0x0"}"#,
        )
        .unwrap();
        assert_eq!(block.number, 0x7777);
        assert_eq!(block.parent_hash, "0xb0");
        assert_eq!(block.timestamp, Some(100_000_000));

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["number"], "0x7777");
        assert_eq!(json["parentHash"], "0xb0");
    }

    #[test]
    fn block_accepts_integer_number_and_rejects_garbage() {
        let block: Block =
            serde_json::from_str(r#"{"number":12,"hash":"0xb1","parentHash":"0xb0"}"#).unwrap();
        assert_eq!(block.number, 12);
        assert_eq!(block.timestamp, None);

        let err = serde_json::from_str::<Block>(r#"{"number":"0xnope","hash":"0x1","parentHash":"0x0"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("not a hex encoded integer"));
    }

    #[test]
    fn log_from_rpc_json() {
        let log: Log = serde_json::from_str(
            r#"{
                "blockNumber": "0x10",
                "blockHash": "0xb10",
                "logIndex": "0x2",
                "transactionIndex": "0x1",
                "transactionHash": "0xt",
                "address": "0xdeadbeef",
                "topics": ["0xfeed"],
                "data": "0x"
            }"#,
        )
        .unwrap();
        assert_eq!(log.block_number, 16);
        assert_eq!(log.log_index, 2);
        assert_eq!(log.transaction_index, Some(1));
        assert_eq!(log.identity(), ("0xb10", 2));
    }

    #[test]
    fn filter_topics_from_json() {
        let filter: Filter = serde_json::from_str(
            r#"{"address":"0xabc","topics":[null,"0x01",["0x02","0x03"]]}"#,
        )
        .unwrap();
        assert_eq!(
            filter.topics,
            vec![
                TopicFilter::Any,
                TopicFilter::Exact("0x01".into()),
                TopicFilter::OneOf(vec!["0x02".into(), "0x03".into()]),
            ]
        );
    }

    #[test]
    fn filter_matches_address_and_topics() {
        let filter = Filter::address("0xAbC")
            .topic(TopicFilter::Any)
            .topic(TopicFilter::OneOf(vec!["0x02".into(), "0x03".into()]));
        let mut log = Log::new(1, "0xb1", 0);
        log.address = "0xabc".into();
        log.topics = vec!["0xff".into(), "0x03".into()];
        assert!(filter.matches(&log));

        log.topics[1] = "0x04".into();
        assert!(!filter.matches(&log));

        assert!(Filter::default().matches(&Log::new(1, "0xb1", 0)));
    }

    #[test]
    fn filter_scoped_to_block() {
        let filter = Filter::address("0xabc").topic(TopicFilter::Exact("0x01".into()));
        let options = filter.for_block("0xb1");
        assert_eq!(options.block_hash, "0xb1");
        assert_eq!(options.filter(), filter);
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["blockHash"], "0xb1");
    }
}
