//! # Ethereum JSON-RPC Types
//!
//! The header and log shapes returned to Ethereum clients (`eth_subscribe`,
//! `eth_getFilterChanges`, ...). Field names serialize in JSON-RPC camelCase.

use crate::primitives::{Address, Bloom, Bytes, Hash, H64, U256, U64};
use serde::{Deserialize, Serialize};

/// Keccak-256 of the RLP encoding of an empty uncle list.
pub const EMPTY_UNCLE_HASH: Hash = Hash([
    0x1d, 0xcc, 0x4d, 0xe8, 0xde, 0xc7, 0x5d, 0x7a, 0xab, 0x85, 0xb5, 0x67, 0xb6, 0xcc, 0xd4, 0x1a,
    0xd3, 0x12, 0x45, 0x1b, 0x94, 0x8a, 0x74, 0x13, 0xf0, 0xa1, 0x42, 0xfd, 0x40, 0xd4, 0x93, 0x47,
]);

/// Root hash of an empty Merkle-Patricia trie.
pub const EMPTY_ROOT_HASH: Hash = Hash([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
]);

/// Ethereum block header as seen by RPC clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthHeader {
    pub parent_hash: Hash,
    #[serde(rename = "sha3Uncles")]
    pub uncle_hash: Hash,
    pub miner: Address,
    pub state_root: Hash,
    #[serde(rename = "transactionsRoot")]
    pub tx_root: Hash,
    pub receipts_root: Hash,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: U256,
    pub gas_limit: U64,
    pub gas_used: U64,
    pub timestamp: U64,
    pub extra_data: Bytes,
    pub mix_hash: Hash,
    pub nonce: H64,
    #[serde(rename = "baseFeePerGas", skip_serializing_if = "Option::is_none", default)]
    pub base_fee: Option<U256>,
}

impl Default for EthHeader {
    fn default() -> Self {
        Self {
            parent_hash: Hash::zero(),
            uncle_hash: EMPTY_UNCLE_HASH,
            miner: Address::zero(),
            state_root: Hash::zero(),
            tx_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            logs_bloom: Bloom::zero(),
            difficulty: U256::zero(),
            number: U256::zero(),
            gas_limit: U64::zero(),
            gas_used: U64::zero(),
            timestamp: U64::zero(),
            extra_data: Bytes::new(),
            mix_hash: Hash::zero(),
            nonce: H64::zero(),
            base_fee: None,
        }
    }
}

/// A contract event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Emitting contract.
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Bytes,
    #[serde(default)]
    pub block_number: U64,
    pub transaction_hash: Hash,
    pub transaction_index: U64,
    pub block_hash: Hash,
    /// Index of the log within the block.
    pub log_index: U64,
    /// True when the log was reverted by a chain reorganization.
    #[serde(default)]
    pub removed: bool,
}
