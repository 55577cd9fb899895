//! # Event Subscriber
//!
//! The subscription side of the event feed, as seen by consumers.

use crate::events::ResultEvent;
use crate::query::Query;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The same subscriber already holds this query.
    #[error("subscriber {subscriber} already subscribed to {query}")]
    AlreadySubscribed { subscriber: String, query: String },

    /// The subscriber holds no subscriptions.
    #[error("subscriber {0} not found")]
    NotFound(String),

    /// Queue capacity must be at least one.
    #[error("subscription capacity must be greater than zero")]
    InvalidCapacity,

    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// Consumer-facing port of an event feed.
///
/// A subscription delivers matching events into a bounded queue owned by the
/// subscriber. The queue closes when the subscriber is torn down with
/// [`EventsClient::unsubscribe_all`] or when the feed shuts down.
#[async_trait]
pub trait EventsClient: Send + Sync {
    /// Registers `query` for `subscriber` with a queue of `capacity` events.
    async fn subscribe(
        &self,
        subscriber: &str,
        query: &Query,
        capacity: usize,
    ) -> Result<mpsc::Receiver<ResultEvent>, SubscriptionError>;

    /// Drops every subscription of `subscriber`, closing their queues.
    async fn unsubscribe_all(&self, subscriber: &str) -> Result<(), SubscriptionError>;
}
