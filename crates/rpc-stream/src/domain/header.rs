//! Ethereum header synthesis from consensus blocks.
//!
//! Consensus blocks carry no gas accounting, bloom or PoW fields; those are
//! filled with fixed values so clients see a well-formed header.

use shared_types::primitives::hash_from_slice;
use shared_types::{
    Address, Bloom, BlockHeader, Bytes, EthHeader, Event, Hash, H64, U256, U64, EMPTY_ROOT_HASH,
    EMPTY_UNCLE_HASH,
};

/// Event type carrying the block's base fee.
pub const FEE_MARKET_EVENT: &str = "fee_market";

/// Attribute of [`FEE_MARKET_EVENT`] holding the decimal base fee.
pub const BASE_FEE_ATTRIBUTE: &str = "base_fee";

/// A new-block notification as delivered to header subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcHeader {
    pub eth_header: EthHeader,
    /// Hash of the originating consensus block header.
    pub hash: Hash,
}

/// Base fee announced by the fee market module, if any.
///
/// Only the first `fee_market.base_fee` attribute is considered; an
/// unparsable value yields `None`.
pub fn base_fee_from_events(events: &[Event]) -> Option<U256> {
    let value = events
        .iter()
        .filter(|e| e.kind == FEE_MARKET_EVENT)
        .find_map(|e| e.attribute(BASE_FEE_ATTRIBUTE))?;
    U256::from_dec_str(value.trim()).ok()
}

/// Builds the Ethereum view of a consensus header.
///
/// `miner` is the proposer's operator account. Negative heights map to zero.
pub fn eth_header_from_block(header: &BlockHeader, miner: Address, base_fee: Option<U256>) -> EthHeader {
    let tx_root = if header.data_hash.is_empty() {
        EMPTY_ROOT_HASH
    } else {
        hash_from_slice(&header.data_hash)
    };

    EthHeader {
        parent_hash: hash_from_slice(&header.last_block_id.hash),
        uncle_hash: EMPTY_UNCLE_HASH,
        miner,
        state_root: hash_from_slice(&header.app_hash),
        tx_root,
        receipts_root: EMPTY_ROOT_HASH,
        logs_bloom: Bloom::zero(),
        difficulty: U256::zero(),
        number: U256::from(u64::try_from(header.height).unwrap_or_default()),
        gas_limit: U64::zero(),
        gas_used: U64::zero(),
        timestamp: U64::from(header.time),
        extra_data: Bytes::new(),
        mix_hash: Hash::zero(),
        nonce: H64::zero(),
        base_fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BlockId, ConsensusAddress};

    fn header() -> BlockHeader {
        BlockHeader {
            chain_id: "quantum_9000-1".to_string(),
            height: 42,
            time: 1_700_000_123,
            last_block_id: BlockId {
                hash: vec![0xAA; 32],
            },
            data_hash: vec![0xBB; 32],
            validators_hash: vec![0xCC; 32],
            app_hash: vec![0xDD; 32],
            proposer_address: ConsensusAddress([0x01; 20]),
        }
    }

    #[test]
    fn test_header_mapping() {
        let miner = Address::repeat_byte(0x77);
        let eth = eth_header_from_block(&header(), miner, Some(U256::from(7)));

        assert_eq!(eth.parent_hash, Hash::repeat_byte(0xAA));
        assert_eq!(eth.uncle_hash, EMPTY_UNCLE_HASH);
        assert_eq!(eth.miner, miner);
        assert_eq!(eth.state_root, Hash::repeat_byte(0xDD));
        assert_eq!(eth.tx_root, Hash::repeat_byte(0xBB));
        assert_eq!(eth.receipts_root, EMPTY_ROOT_HASH);
        assert_eq!(eth.logs_bloom, Bloom::zero());
        assert_eq!(eth.number, U256::from(42));
        assert_eq!(eth.timestamp, U64::from(1_700_000_123u64));
        assert_eq!(eth.gas_limit, U64::zero());
        assert!(eth.extra_data.is_empty());
        assert_eq!(eth.base_fee, Some(U256::from(7)));
    }

    #[test]
    fn test_empty_block_uses_empty_root() {
        let mut header = header();
        header.data_hash.clear();
        let eth = eth_header_from_block(&header, Address::zero(), None);
        assert_eq!(eth.tx_root, EMPTY_ROOT_HASH);
        assert_eq!(eth.base_fee, None);
    }

    #[test]
    fn test_base_fee_parsing() {
        let events = vec![
            Event::new("coin_spent").with_attribute("amount", "10"),
            Event::new(FEE_MARKET_EVENT).with_attribute(BASE_FEE_ATTRIBUTE, "875000000"),
        ];
        assert_eq!(base_fee_from_events(&events), Some(U256::from(875_000_000u64)));
    }

    #[test]
    fn test_base_fee_absent_or_invalid() {
        assert_eq!(base_fee_from_events(&[]), None);

        let events = vec![Event::new(FEE_MARKET_EVENT).with_attribute(BASE_FEE_ATTRIBUTE, "0x10")];
        assert_eq!(base_fee_from_events(&events), None);

        let events = vec![Event::new(FEE_MARKET_EVENT).with_attribute("other", "1")];
        assert_eq!(base_fee_from_events(&events), None);
    }
}
