//! EVM log decoder.
//!
//! The EVM module reports each emitted log as a `tx_log` event whose `txLog`
//! attribute holds the log in JSON-RPC form. Logs are returned in event
//! order with `blockNumber` set to the inclusion height.

use shared_types::{Event, Log, U64};

use crate::domain::DecodeError;
use crate::ports::TxLogDecoder;

/// Event type carrying one EVM log.
pub const TX_LOG_EVENT: &str = "tx_log";

/// Attribute of [`TX_LOG_EVENT`] holding the JSON log.
pub const TX_LOG_ATTRIBUTE: &str = "txLog";

/// Decodes logs from `tx_log` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmLogDecoder;

impl EvmLogDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl TxLogDecoder for EvmLogDecoder {
    fn decode_logs(&self, _data: &[u8], events: &[Event], height: u64) -> Result<Vec<Log>, DecodeError> {
        events
            .iter()
            .filter(|e| e.kind == TX_LOG_EVENT)
            .flat_map(|e| e.attributes.iter().filter(|a| a.key == TX_LOG_ATTRIBUTE))
            .enumerate()
            .map(|(index, attr)| {
                let mut log: Log = serde_json::from_str(&attr.value).map_err(|e| {
                    DecodeError::Malformed {
                        index,
                        reason: e.to_string(),
                    }
                })?;
                log.block_number = U64::from(height);
                Ok(log)
            })
            .collect()
    }
}

/// Encodes `logs` as a single `tx_log` event, one attribute per log.
pub fn tx_log_event(logs: &[Log]) -> Result<Event, DecodeError> {
    logs.iter().try_fold(Event::new(TX_LOG_EVENT), |event, log| {
        let json = serde_json::to_string(log).map_err(|e| DecodeError::Encode(e.to_string()))?;
        Ok(event.with_attribute(TX_LOG_ATTRIBUTE, json))
    })
}
