//! Domain types for the RPC stream core.
//!
//! Pure data and logic: the bounded stream, header synthesis, configuration
//! and error types. Event-feed I/O lives in `service` and `adapters`.

pub mod config;
pub mod error;
pub mod header;
pub mod stream;

pub use config::{StreamConfig, StreamLimits};
pub use error::{ConfigError, DecodeError, ResolveError, StreamError};
pub use header::{base_fee_from_events, eth_header_from_block, RpcHeader};
pub use stream::{Batch, BoundedEventStream, Cursor};
