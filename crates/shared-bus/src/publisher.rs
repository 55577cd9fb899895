//! # Event Publisher
//!
//! The publishing side of the event feed and its in-memory implementation.

use crate::events::{
    flatten_events, EventData, EventDataNewBlock, EventDataTx, ResultEvent, EVENT_TYPE_KEY,
};
use crate::query::Query;
use crate::subscriber::{EventsClient, SubscriptionError};
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Trait for publishing events to the feed.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `data` with its flattened attribute map.
    ///
    /// `tm.event` is always set from the payload kind, overriding any value
    /// supplied by the caller.
    ///
    /// # Returns
    ///
    /// The number of subscriptions the event was delivered to.
    async fn publish(&self, data: EventData, events: BTreeMap<String, Vec<String>>) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

struct Subscription {
    subscriber: String,
    query: Query,
    /// Cached `query.to_string()`.
    query_str: String,
    sender: mpsc::Sender<ResultEvent>,
}

/// In-memory implementation of the event feed.
///
/// Each subscription owns a bounded `tokio::sync::mpsc` queue. Suitable for
/// single-process operation and tests.
pub struct InMemoryEventBus {
    subscriptions: RwLock<Vec<Subscription>>,

    /// Total events published.
    events_published: AtomicU64,

    /// Deliveries dropped because a queue was full.
    events_dropped: AtomicU64,

    closed: AtomicBool,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Publish a committed block.
    ///
    /// The attribute map is built from the finalize-block events.
    pub async fn publish_new_block(&self, data: EventDataNewBlock) -> usize {
        let events = flatten_events(
            crate::events::EVENT_NEW_BLOCK,
            &data.result_finalize_block.events,
        );
        self.publish(EventData::NewBlock(data), events).await
    }

    /// Publish an executed transaction.
    ///
    /// The attribute map is built from the execution events plus `tx.hash`
    /// (upper-case hex SHA-256 of the raw tx) and `tx.height`.
    pub async fn publish_tx(&self, data: EventDataTx) -> usize {
        let mut events = flatten_events(crate::events::EVENT_TX, &data.tx_result.result.events);
        let tx_hash = hex::encode_upper(Sha256::digest(&data.tx_result.tx));
        events.insert("tx.hash".to_string(), vec![tx_hash]);
        events.insert(
            "tx.height".to_string(),
            vec![data.tx_result.height.to_string()],
        );
        self.publish(EventData::Tx(data), events).await
    }

    /// Close every subscription and refuse new ones.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let dropped = std::mem::take(&mut *self.subscriptions.write());
        debug!(subscriptions = dropped.len(), "Event bus shut down");
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Whether `subscriber` holds any subscription.
    #[must_use]
    pub fn is_subscribed(&self, subscriber: &str) -> bool {
        self.subscriptions
            .read()
            .iter()
            .any(|s| s.subscriber == subscriber)
    }

    /// Deliveries dropped on full queues.
    #[must_use]
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, data: EventData, mut events: BTreeMap<String, Vec<String>>) -> usize {
        let kind = data.kind();
        events.insert(EVENT_TYPE_KEY.to_string(), vec![kind.to_string()]);

        // Always increment counter (event was attempted)
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let mut subs = self.subscriptions.write();
        subs.retain(|s| !s.sender.is_closed());

        let mut delivered = 0;
        for sub in subs.iter().filter(|s| s.query.matches(&events)) {
            let event = ResultEvent {
                query: sub.query_str.clone(),
                data: data.clone(),
                events: events.clone(),
            };
            match sub.sender.try_send(event) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.events_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        subscriber = %sub.subscriber,
                        query = %sub.query_str,
                        kind,
                        "Event dropped (subscriber queue full)"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = %sub.subscriber, "Subscriber queue closed");
                }
            }
        }

        debug!(kind, receivers = delivered, "Event published");
        delivered
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventsClient for InMemoryEventBus {
    async fn subscribe(
        &self,
        subscriber: &str,
        query: &Query,
        capacity: usize,
    ) -> Result<mpsc::Receiver<ResultEvent>, SubscriptionError> {
        if capacity == 0 {
            return Err(SubscriptionError::InvalidCapacity);
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(SubscriptionError::Closed);
        }

        let mut subs = self.subscriptions.write();
        subs.retain(|s| !s.sender.is_closed());
        if subs
            .iter()
            .any(|s| s.subscriber == subscriber && &s.query == query)
        {
            return Err(SubscriptionError::AlreadySubscribed {
                subscriber: subscriber.to_string(),
                query: query.to_string(),
            });
        }

        let (sender, receiver) = mpsc::channel(capacity);
        subs.push(Subscription {
            subscriber: subscriber.to_string(),
            query: query.clone(),
            query_str: query.to_string(),
            sender,
        });

        debug!(subscriber, query = %query, capacity, "New subscription created");
        Ok(receiver)
    }

    async fn unsubscribe_all(&self, subscriber: &str) -> Result<(), SubscriptionError> {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|s| s.subscriber != subscriber);
        let removed = before - subs.len();

        if removed == 0 {
            return Err(SubscriptionError::NotFound(subscriber.to_string()));
        }
        debug!(subscriber, removed, "Subscriber removed");
        Ok(())
    }
}
