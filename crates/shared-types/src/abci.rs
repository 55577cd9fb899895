//! # ABCI Execution Types
//!
//! Typed events and execution results emitted by the application when a
//! block is finalized. Events are `type` + ordered key/value attributes;
//! subscribers usually see them flattened as `type.key → [values]`.

use serde::{Deserialize, Serialize};

/// A single event attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
    /// Whether the engine indexes this attribute for queries.
    pub index: bool,
}

impl EventAttribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            index: true,
        }
    }
}

/// A typed application event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, e.g. `ethereum_tx`, `tx_log`, `fee_market`.
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute append.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(EventAttribute::new(key, value));
        self
    }

    /// First value of `key`, if present.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Result of executing one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecTxResult {
    /// Zero on success.
    pub code: u32,
    /// Application-encoded response payload.
    pub data: Vec<u8>,
    pub log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub events: Vec<Event>,
}

impl ExecTxResult {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// An executed transaction together with its position in the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub height: i64,
    /// Index of the transaction within its block.
    pub index: u32,
    /// Raw transaction bytes.
    pub tx: Vec<u8>,
    pub result: ExecTxResult,
}

/// Outcome of finalizing a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFinalizeBlock {
    /// Block-level events (begin/end block hooks, fee market updates, ...).
    pub events: Vec<Event>,
    pub tx_results: Vec<ExecTxResult>,
}
