//! Error types for the RPC stream core.

use shared_bus::SubscriptionError;
use shared_types::ConsensusAddress;
use thiserror::Error;

/// Errors surfaced by [`RpcStreams`](crate::RpcStreams).
#[derive(Debug, Error)]
pub enum StreamError {
    /// Lazy subscription setup failed. The manager stays uninitialized and
    /// the next stream access retries.
    #[error("failed to subscribe to `{query}`: {source}")]
    Subscribe {
        query: String,
        #[source]
        source: SubscriptionError,
    },

    /// Tearing down the subscriptions failed. The manager keeps running and
    /// `close` may be retried.
    #[error("failed to unsubscribe `{subscriber}`: {source}")]
    Unsubscribe {
        subscriber: String,
        #[source]
        source: SubscriptionError,
    },

    /// The event-processing task panicked or was cancelled.
    #[error("event stream task failed: {0}")]
    Task(String),
}

/// Errors from turning a transaction's execution result into logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed log #{index}: {reason}")]
    Malformed { index: usize, reason: String },

    #[error("failed to encode log: {0}")]
    Encode(String),
}

/// Errors from mapping a consensus address to its operator account.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown validator {address} at height {height}")]
    UnknownValidator {
        height: i64,
        address: ConsensusAddress,
    },

    #[error("validator query failed: {0}")]
    Query(String),
}

/// Configuration validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {stream} stream limits: {reason}")]
    InvalidLimits {
        stream: &'static str,
        reason: String,
    },

    #[error("subscriber name cannot be empty")]
    EmptySubscriberName,

    #[error("subscribe_buffer_size cannot be 0")]
    InvalidBufferSize,
}
