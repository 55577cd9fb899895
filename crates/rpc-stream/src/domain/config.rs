//! Stream sizing configuration with validation.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default subscriber id on the event feed.
pub const DEFAULT_SUBSCRIBER_NAME: &str = "quantum-chain-json-rpc";

/// Default queue depth for each event-feed subscription.
pub const DEFAULT_SUBSCRIBE_BUFFER_SIZE: usize = 1024;

/// Segment size and retained-item cap of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLimits {
    /// Items per segment
    pub segment_size: usize,
    /// Maximum retained items; a whole number of segments
    pub capacity: usize,
}

impl StreamLimits {
    pub const fn new(segment_size: usize, capacity: usize) -> Self {
        Self {
            segment_size,
            capacity,
        }
    }

    /// Number of segments needed to hold `capacity` items.
    pub fn segments(&self) -> usize {
        if self.segment_size == 0 {
            0
        } else {
            self.capacity / self.segment_size
        }
    }

    fn validate(&self, stream: &'static str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidLimits {
            stream,
            reason: reason.to_string(),
        };

        if self.segment_size == 0 {
            return Err(invalid("segment_size cannot be 0"));
        }
        if self.capacity == 0 {
            return Err(invalid("capacity cannot be 0"));
        }
        if self.capacity % self.segment_size != 0 {
            return Err(invalid("capacity must be a multiple of segment_size"));
        }
        Ok(())
    }
}

/// Configuration for [`RpcStreams`](crate::RpcStreams).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// New block headers
    pub headers: StreamLimits,
    /// Pending transaction hashes
    pub pending_txs: StreamLimits,
    /// Decoded EVM logs
    pub logs: StreamLimits,
    /// Queue depth of each event-feed subscription
    pub subscribe_buffer_size: usize,
    /// Subscriber id on the event feed
    pub subscriber_name: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            headers: StreamLimits::new(128, 128 * 32),
            pending_txs: StreamLimits::new(1024, 1024 * 32),
            logs: StreamLimits::new(2048, 2048 * 32),
            subscribe_buffer_size: DEFAULT_SUBSCRIBE_BUFFER_SIZE,
            subscriber_name: DEFAULT_SUBSCRIBER_NAME.to_string(),
        }
    }
}

impl StreamConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.headers.validate("headers")?;
        self.pending_txs.validate("pending_txs")?;
        self.logs.validate("logs")?;

        if self.subscribe_buffer_size == 0 {
            return Err(ConfigError::InvalidBufferSize);
        }
        if self.subscriber_name.trim().is_empty() {
            return Err(ConfigError::EmptySubscriberName);
        }
        Ok(())
    }
}
