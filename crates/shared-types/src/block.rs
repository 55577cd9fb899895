//! # Consensus Block Types
//!
//! The block shape delivered by the consensus engine on `NewBlock` events.
//! Only the fields the RPC facade maps onto Ethereum headers are modelled.

use crate::primitives::Hash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// 20-byte consensus (validator) address, as carried in `proposer_address`.
///
/// This is the validator's consensus key address, not its account address;
/// mapping one to the other needs a state query at the block's height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ConsensusAddress(pub [u8; 20]);

impl ConsensusAddress {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for ConsensusAddress {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ConsensusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

/// Identifier of a previous block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockId {
    /// Hash of the referenced block header.
    pub hash: Vec<u8>,
}

/// Consensus block header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Chain identifier.
    pub chain_id: String,
    /// Block height. Signed because the engine reports it that way.
    pub height: i64,
    /// Block time in unix seconds.
    pub time: u64,
    /// Previous block.
    pub last_block_id: BlockId,
    /// Merkle root of the block's transactions. Empty for blocks without txs.
    pub data_hash: Vec<u8>,
    /// Hash of the validator set for this block.
    pub validators_hash: Vec<u8>,
    /// Application state root after the previous block.
    pub app_hash: Vec<u8>,
    /// Consensus address of the block proposer.
    pub proposer_address: ConsensusAddress,
}

impl BlockHeader {
    /// Canonical hash of this header.
    ///
    /// SHA-256 over every field in declaration order, each variable-length
    /// field prefixed with its big-endian `u64` length.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        update_prefixed(&mut hasher, self.chain_id.as_bytes());
        hasher.update(self.height.to_be_bytes());
        hasher.update(self.time.to_be_bytes());
        update_prefixed(&mut hasher, &self.last_block_id.hash);
        update_prefixed(&mut hasher, &self.data_hash);
        update_prefixed(&mut hasher, &self.validators_hash);
        update_prefixed(&mut hasher, &self.app_hash);
        hasher.update(self.proposer_address.0);
        Hash::from_slice(&hasher.finalize())
    }
}

fn update_prefixed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// A committed block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// Raw transactions, in block order.
    pub txs: Vec<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(height: i64) -> BlockHeader {
        BlockHeader {
            chain_id: "quantum_9000-1".to_string(),
            height,
            time: 1_700_000_000,
            last_block_id: BlockId { hash: vec![0x11; 32] },
            data_hash: vec![],
            validators_hash: vec![0x22; 32],
            app_hash: vec![0x33; 32],
            proposer_address: ConsensusAddress([0x44; 20]),
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(header(7).hash(), header(7).hash());
    }

    #[test]
    fn test_hash_covers_height() {
        assert_ne!(header(7).hash(), header(8).hash());
    }

    #[test]
    fn test_hash_distinguishes_field_boundaries() {
        let mut a = header(1);
        a.data_hash = vec![1, 2];
        a.app_hash = vec![3];
        let mut b = header(1);
        b.data_hash = vec![1];
        b.app_hash = vec![2, 3];
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_consensus_address_display() {
        let addr = ConsensusAddress([0xAB; 20]);
        assert_eq!(addr.to_string(), "AB".repeat(20));
    }
}
