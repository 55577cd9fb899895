//! # Shared Types Crate
//!
//! Types shared by the consensus event feed (`shared-bus`) and the RPC
//! stream core (`qc-rpc-stream`).
//!
//! ## Clusters
//!
//! - **Primitives**: `Hash`, `Address`, `Bloom`, `U256`, hex-serialized `Bytes`
//! - **Consensus**: `BlockHeader`, `Block`, `ConsensusAddress`
//! - **ABCI**: `Event`, `EventAttribute`, `ExecTxResult`, `TxResult`,
//!   `ResultFinalizeBlock`
//! - **Ethereum RPC**: `EthHeader`, `Log`
//!
//! ## Design Principles
//!
//! - **Two vocabularies, one crate**: consensus-side types describe what the
//!   engine emits; Ethereum-side types describe what RPC clients read. The
//!   mapping between them lives in the stream core, not here.
//! - **Immutable values**: everything here is plain data with `Clone`.

pub mod abci;
pub mod block;
pub mod eth;
pub mod primitives;

pub use abci::{Event, EventAttribute, ExecTxResult, ResultFinalizeBlock, TxResult};
pub use block::{Block, BlockHeader, BlockId, ConsensusAddress};
pub use eth::{EthHeader, Log, EMPTY_ROOT_HASH, EMPTY_UNCLE_HASH};
pub use primitives::{Address, Bloom, Bytes, Hash, H64, U256, U64};
