//! # Consensus Events
//!
//! Payloads that flow through the bus and the envelope delivered to
//! subscribers.

use serde::{Deserialize, Serialize};
use shared_types::{Block, BlockHeader, Event, ResultFinalizeBlock, TxResult};
use std::collections::BTreeMap;

/// Attribute key carrying the event kind in every event map.
pub const EVENT_TYPE_KEY: &str = "tm.event";

/// Kind of a committed block event.
pub const EVENT_NEW_BLOCK: &str = "NewBlock";

/// Kind of a header-only block event.
pub const EVENT_NEW_BLOCK_HEADER: &str = "NewBlockHeader";

/// Kind of an executed transaction event.
pub const EVENT_TX: &str = "Tx";

/// A committed block with the result of finalizing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDataNewBlock {
    pub block: Block,
    pub result_finalize_block: ResultFinalizeBlock,
}

/// An executed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDataTx {
    pub tx_result: TxResult,
}

/// Typed payload of a bus event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventData {
    NewBlock(EventDataNewBlock),
    /// Header-only announcement, published ahead of the full block.
    NewBlockHeader(BlockHeader),
    Tx(EventDataTx),
}

impl EventData {
    /// The `tm.event` value for this payload.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewBlock(_) => EVENT_NEW_BLOCK,
            Self::NewBlockHeader(_) => EVENT_NEW_BLOCK_HEADER,
            Self::Tx(_) => EVENT_TX,
        }
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEvent {
    /// Canonical string of the query this event matched.
    pub query: String,
    pub data: EventData,
    /// Flattened `type.key → [values]` attribute map.
    pub events: BTreeMap<String, Vec<String>>,
}

impl ResultEvent {
    /// Whether the attribute map carries `key`.
    #[must_use]
    pub fn has_attribute(&self, key: &str) -> bool {
        self.events.contains_key(key)
    }
}

/// Flattens ABCI events into a `type.key → [values]` map.
///
/// Values for a repeated key keep emission order. `tm.event` is set to `kind`.
#[must_use]
pub fn flatten_events(kind: &str, events: &[Event]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for event in events {
        for attr in &event.attributes {
            map.entry(format!("{}.{}", event.kind, attr.key))
                .or_default()
                .push(attr.value.clone());
        }
    }
    map.insert(EVENT_TYPE_KEY.to_string(), vec![kind.to_string()]);
    map
}
