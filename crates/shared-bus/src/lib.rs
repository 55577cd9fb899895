//! # Shared Bus - Consensus Event Feed
//!
//! The publish/subscribe feed through which the consensus engine announces
//! committed blocks and executed transactions to in-process consumers such
//! as the JSON-RPC stream core.
//!
//! ## Model
//!
//! ```text
//! ┌──────────────┐  publish_new_block()   ┌──────────────┐
//! │  Consensus   │  publish_tx()          │  Event Bus   │
//! │   Engine     │ ─────────────────────▶ │              │
//! └──────────────┘                        └──────┬───────┘
//!                                                │ Query::matches(events)
//!                              ┌─────────────────┼─────────────────┐
//!                              ▼                 ▼                 ▼
//!                     mpsc::Receiver    mpsc::Receiver    mpsc::Receiver
//!                   (subscriber, query) ...
//! ```
//!
//! Every published event carries a flattened attribute map
//! (`type.key → [values]`, plus `tm.event`). A subscription is a
//! `(subscriber, query)` pair with its own bounded queue; events are
//! delivered to every subscription whose [`Query`] matches the map.
//!
//! ## Delivery
//!
//! - Delivery never blocks the publisher: a full queue drops the event for
//!   that subscription and logs a warning.
//! - Queues whose receiver was dropped are pruned on the next publish.
//! - `unsubscribe_all` closes every queue of a subscriber at once.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod query;
pub mod subscriber;

pub use events::{
    flatten_events, EventData, EventDataNewBlock, EventDataTx, ResultEvent, EVENT_NEW_BLOCK,
    EVENT_NEW_BLOCK_HEADER, EVENT_TX, EVENT_TYPE_KEY,
};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use query::{Condition, Query, QueryError};
pub use subscriber::{EventsClient, SubscriptionError};

