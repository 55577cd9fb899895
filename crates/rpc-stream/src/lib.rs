//! # QC RPC Stream
//!
//! Event-streaming core of the JSON-RPC facade: turns consensus events and
//! mempool admissions into three bounded, ordered, multi-reader streams.
//!
//! ## Streams
//!
//! | Stream | Item | Source |
//! |--------|------|--------|
//! | headers | [`RpcHeader`] | `NewBlock` events |
//! | logs | [`Log`](shared_types::Log) | EVM `Tx` events |
//! | pending txs | [`Hash`](shared_types::Hash) | [`PendingTxListener`] |
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `BoundedEventStream`: segmented ring buffer with cursors
//!   - `eth_header_from_block`: consensus → Ethereum header mapping
//!   - `StreamConfig`: sizing with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `EventsClient`: the consensus event feed (driven)
//!   - `TxLogDecoder`, `ValidatorAccountResolver`: per-event collaborators
//!   - `PendingTxListener`: admission callback (driving)
//!
//! - **Service Layer** (`service.rs`): `RpcStreams` lifecycle and the
//!   demultiplexing task
//!
//! - **Adapters Layer** (`adapters/`): `EvmLogDecoder`,
//!   `StaticValidatorAccounts`
//!
//! ## Invariants
//!
//! - A stream never retains more than its capacity; overflow evicts the
//!   oldest items in the same critical section as the append.
//! - Items within a stream keep append order; one decoded transaction's logs
//!   are appended as one contiguous run.
//! - A malformed or unresolvable event is logged and skipped; it never stops
//!   the demultiplexer.
//!
//! ## Usage Example
//!
//! ```ignore
//! use qc_rpc_stream::{EvmLogDecoder, RpcStreams, StaticValidatorAccounts, StreamConfig};
//! use shared_bus::InMemoryEventBus;
//! use std::sync::Arc;
//!
//! let bus = Arc::new(InMemoryEventBus::new());
//! let streams = RpcStreams::new(
//!     bus.clone(),
//!     Arc::new(EvmLogDecoder::new()),
//!     Arc::new(StaticValidatorAccounts::new()),
//!     StreamConfig::default(),
//! );
//!
//! let headers = streams.header_stream().await?;
//! let mut cursor = headers.tail();
//! loop {
//!     let batch = headers.read_timeout(cursor, 64, Duration::from_secs(30)).await;
//!     cursor = batch.next;
//!     // ...
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{tx_log_event, EvmLogDecoder, StaticValidatorAccounts};
pub use domain::{
    base_fee_from_events, eth_header_from_block, Batch, BoundedEventStream, ConfigError, Cursor,
    DecodeError, ResolveError, RpcHeader, StreamConfig, StreamError, StreamLimits,
};
pub use ports::{EventsClient, PendingTxListener, TxLogDecoder, ValidatorAccountResolver};
pub use service::{evm_tx_query, new_block_query, RpcStreams, StreamState, EVM_TX_HASH_KEY};
