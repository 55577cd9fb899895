//! Outbound Ports (Driven Ports)
//!
//! Dependencies the stream core needs from the rest of the node.

use async_trait::async_trait;
use shared_types::{Address, ConsensusAddress, Event, Log};

use crate::domain::{DecodeError, ResolveError};

pub use shared_bus::EventsClient;

/// Extracts EVM logs from a transaction's execution result.
pub trait TxLogDecoder: Send + Sync {
    /// Decode every log emitted by one transaction, in emission order.
    ///
    /// `data` is the raw execution response, `events` the ABCI events it
    /// emitted, and `height` the block it was included in.
    fn decode_logs(&self, data: &[u8], events: &[Event], height: u64) -> Result<Vec<Log>, DecodeError>;
}

/// Maps a block proposer's consensus address to its operator account.
///
/// The mapping is height-dependent, so implementations typically query state
/// as of `height`.
#[async_trait]
pub trait ValidatorAccountResolver: Send + Sync {
    async fn validator_account(
        &self,
        height: i64,
        proposer: &ConsensusAddress,
    ) -> Result<Address, ResolveError>;
}
