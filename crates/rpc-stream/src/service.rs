//! # RPC Stream Service
//!
//! Owns the three streams and the task that feeds two of them from the
//! consensus event feed.
//!
//! ## Lifecycle
//!
//! ```text
//!                 header_stream() / log_stream()
//!  Uninitialized ───────────────────────────────▶ Subscribing
//!       ▲                                             │
//!       │ subscribe failed                            │ both subscriptions up,
//!       └─────────────────────────────────────────────┤ demux task spawned
//!                                                     ▼
//!                         close()                  Running
//!  Closed ◀───────────────────────────────────────────┘
//! ```
//!
//! Subscription is deferred until a consumer first asks for the header or
//! log stream; a node that never serves those never subscribes. The pending
//! transaction stream is live from construction and has no lifecycle.
//!
//! Startup runs on its own task holding the lifecycle lock, so a caller
//! that gives up waiting (a request timeout) leaves it to finish or roll
//! back on its own.

use shared_bus::{
    EventData, Query, ResultEvent, SubscriptionError, EVENT_NEW_BLOCK, EVENT_TX,
};
use shared_types::{Hash, Log};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, Instrument};

use crate::domain::{
    base_fee_from_events, eth_header_from_block, BoundedEventStream, RpcHeader, StreamConfig,
    StreamError,
};
use crate::ports::{EventsClient, PendingTxListener, TxLogDecoder, ValidatorAccountResolver};

/// Attribute present on every transaction executed by the EVM module.
pub const EVM_TX_HASH_KEY: &str = "ethereum_tx.ethereumTxHash";

/// Attribute the EVM transaction query filters on.
pub const MESSAGE_MODULE_KEY: &str = "message.module";

/// Observable lifecycle state of [`RpcStreams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Uninitialized,
    Subscribing,
    Running,
    Closed,
}

/// Lock-free mirror of the lifecycle, shared with the startup task.
#[derive(Debug, Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn get(&self) -> StreamState {
        StreamState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: StreamState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

impl StreamState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Subscribing,
            2 => Self::Running,
            3 => Self::Closed,
            _ => Self::Uninitialized,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Subscribing => 1,
            Self::Running => 2,
            Self::Closed => 3,
        }
    }
}

enum Lifecycle {
    Uninitialized,
    Running(JoinHandle<()>),
    Closed,
}

/// Query selecting committed blocks.
pub fn new_block_query() -> Query {
    Query::for_event(EVENT_NEW_BLOCK)
}

/// Query selecting transactions routed through the EVM module.
pub fn evm_tx_query() -> Query {
    Query::for_event(EVENT_TX).and_equals(MESSAGE_MODULE_KEY, "evm")
}

/// Stream manager for the JSON-RPC subscription surface.
pub struct RpcStreams {
    client: Arc<dyn EventsClient>,
    decoder: Arc<dyn TxLogDecoder>,
    resolver: Arc<dyn ValidatorAccountResolver>,
    config: StreamConfig,

    headers: Arc<BoundedEventStream<RpcHeader>>,
    logs: Arc<BoundedEventStream<Log>>,
    pending_txs: Arc<BoundedEventStream<Hash>>,

    lifecycle: Arc<Mutex<Lifecycle>>,
    state: Arc<StateCell>,
}

impl RpcStreams {
    /// Creates the manager. Nothing is subscribed until the header or log
    /// stream is first requested.
    ///
    /// `config` is expected to have passed [`StreamConfig::validate`];
    /// degenerate limits are normalized by the streams themselves.
    pub fn new(
        client: Arc<dyn EventsClient>,
        decoder: Arc<dyn TxLogDecoder>,
        resolver: Arc<dyn ValidatorAccountResolver>,
        config: StreamConfig,
    ) -> Self {
        let headers = Arc::new(BoundedEventStream::new(
            config.headers.segment_size,
            config.headers.capacity,
        ));
        let logs = Arc::new(BoundedEventStream::new(
            config.logs.segment_size,
            config.logs.capacity,
        ));
        let pending_txs = Arc::new(BoundedEventStream::new(
            config.pending_txs.segment_size,
            config.pending_txs.capacity,
        ));

        Self {
            client,
            decoder,
            resolver,
            config,
            headers,
            logs,
            pending_txs,
            lifecycle: Arc::new(Mutex::new(Lifecycle::Uninitialized)),
            state: Arc::new(StateCell::default()),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn state(&self) -> StreamState {
        self.state.get()
    }

    /// New block headers. Subscribes to the event feed on first use.
    pub async fn header_stream(&self) -> Result<Arc<BoundedEventStream<RpcHeader>>, StreamError> {
        self.ensure_started().await?;
        Ok(Arc::clone(&self.headers))
    }

    /// Decoded EVM logs. Subscribes to the event feed on first use.
    pub async fn log_stream(&self) -> Result<Arc<BoundedEventStream<Log>>, StreamError> {
        self.ensure_started().await?;
        Ok(Arc::clone(&self.logs))
    }

    /// Pending transaction hashes. Never subscribes.
    pub fn pending_tx_stream(&self) -> Arc<BoundedEventStream<Hash>> {
        Arc::clone(&self.pending_txs)
    }

    /// Records a transaction that passed admission checks.
    pub fn ingest(&self, hash: Hash) {
        self.pending_txs.append([hash]);
    }

    /// Listener bound to the pending transaction stream, for registration
    /// with the transaction-admission path.
    pub fn pending_tx_listener(&self) -> PendingTxListener {
        let stream = Arc::clone(&self.pending_txs);
        Arc::new(move |hash| {
            stream.append([hash]);
        })
    }

    async fn ensure_started(&self) -> Result<(), StreamError> {
        if matches!(self.state(), StreamState::Running | StreamState::Closed) {
            return Ok(());
        }

        let lifecycle = Arc::clone(&self.lifecycle).lock_owned().await;
        if !matches!(*lifecycle, Lifecycle::Uninitialized) {
            return Ok(());
        }

        let startup = Startup {
            client: Arc::clone(&self.client),
            demux: Demux {
                client: Arc::clone(&self.client),
                decoder: Arc::clone(&self.decoder),
                resolver: Arc::clone(&self.resolver),
                headers: Arc::clone(&self.headers),
                logs: Arc::clone(&self.logs),
                subscriber: self.config.subscriber_name.clone(),
            },
            buffer_size: self.config.subscribe_buffer_size,
            state: Arc::clone(&self.state),
        };
        tokio::spawn(startup.run(lifecycle))
            .await
            .map_err(|e| StreamError::Task(e.to_string()))?
    }

    /// Unsubscribes from the event feed and waits for the demux task to exit.
    ///
    /// A no-op when never started or already closed. If the feed refuses to
    /// unsubscribe, the manager keeps running and the call may be retried.
    pub async fn close(&self) -> Result<(), StreamError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Running(_)) {
            return Ok(());
        }

        let subscriber = &self.config.subscriber_name;
        match self.client.unsubscribe_all(subscriber).await {
            Ok(()) => {}
            // The feed already dropped us (e.g. it shut down); nothing to undo.
            Err(SubscriptionError::NotFound(_)) => {
                debug!(subscriber = %subscriber, "Subscriber already removed from event feed");
            }
            Err(source) => {
                return Err(StreamError::Unsubscribe {
                    subscriber: subscriber.clone(),
                    source,
                })
            }
        }

        let Lifecycle::Running(task) = std::mem::replace(&mut *lifecycle, Lifecycle::Closed) else {
            return Ok(());
        };
        self.state.set(StreamState::Closed);

        task.await.map_err(|e| StreamError::Task(e.to_string()))?;
        info!(subscriber = %subscriber, "RPC event streams closed");
        Ok(())
    }
}

impl Drop for RpcStreams {
    fn drop(&mut self) {
        // A startup still holding the lock leaves its demux task to end when
        // the feed closes the queues.
        if let Ok(lifecycle) = self.lifecycle.try_lock() {
            if let Lifecycle::Running(task) = &*lifecycle {
                task.abort();
            }
        }
    }
}

/// Subscribes to the feed and spawns the demux task.
struct Startup {
    client: Arc<dyn EventsClient>,
    demux: Demux,
    buffer_size: usize,
    state: Arc<StateCell>,
}

impl Startup {
    async fn run(self, mut lifecycle: OwnedMutexGuard<Lifecycle>) -> Result<(), StreamError> {
        self.state.set(StreamState::Subscribing);
        let (blocks, txs) = match self.subscribe().await {
            Ok(queues) => queues,
            Err(e) => {
                self.state.set(StreamState::Uninitialized);
                return Err(e);
            }
        };

        let subscriber = self.demux.subscriber.clone();
        let span = info_span!("rpc_stream", subsystem = "rpc-stream", subscriber = %subscriber);
        let task = tokio::spawn(self.demux.run(blocks, txs).instrument(span));

        *lifecycle = Lifecycle::Running(task);
        self.state.set(StreamState::Running);
        info!(subscriber = %subscriber, "RPC event streams started");
        Ok(())
    }

    async fn subscribe(
        &self,
    ) -> Result<(mpsc::Receiver<ResultEvent>, mpsc::Receiver<ResultEvent>), StreamError> {
        let subscriber = &self.demux.subscriber;

        let block_query = new_block_query();
        let blocks = self
            .client
            .subscribe(subscriber, &block_query, self.buffer_size)
            .await
            .map_err(|source| StreamError::Subscribe {
                query: block_query.to_string(),
                source,
            })?;

        let tx_query = evm_tx_query();
        match self
            .client
            .subscribe(subscriber, &tx_query, self.buffer_size)
            .await
        {
            Ok(txs) => Ok((blocks, txs)),
            Err(source) => {
                if let Err(e) = self.client.unsubscribe_all(subscriber).await {
                    error!(subscriber = %subscriber, error = %e, "Failed to roll back block subscription");
                }
                Err(StreamError::Subscribe {
                    query: tx_query.to_string(),
                    source,
                })
            }
        }
    }
}

/// Routes feed events into the header and log streams.
struct Demux {
    client: Arc<dyn EventsClient>,
    decoder: Arc<dyn TxLogDecoder>,
    resolver: Arc<dyn ValidatorAccountResolver>,
    headers: Arc<BoundedEventStream<RpcHeader>>,
    logs: Arc<BoundedEventStream<Log>>,
    subscriber: String,
}

impl Demux {
    async fn run(
        self,
        mut blocks: mpsc::Receiver<ResultEvent>,
        mut txs: mpsc::Receiver<ResultEvent>,
    ) {
        let mut blocks_open = true;
        let mut txs_open = true;

        loop {
            tokio::select! {
                event = blocks.recv(), if blocks_open => match event {
                    Some(event) => self.on_new_block(event).await,
                    None => {
                        debug!("New block queue closed");
                        blocks_open = false;
                    }
                },
                event = txs.recv(), if txs_open => match event {
                    Some(event) => self.on_tx(event),
                    None => {
                        debug!("Transaction queue closed");
                        txs_open = false;
                    }
                },
                else => break,
            }
        }

        match self.client.unsubscribe_all(&self.subscriber).await {
            Ok(()) | Err(SubscriptionError::NotFound(_)) => {}
            Err(e) => error!(error = %e, "Failed to unsubscribe from event feed"),
        }
        debug!("Event demultiplexer stopped");
    }

    async fn on_new_block(&self, event: ResultEvent) {
        let EventData::NewBlock(data) = event.data else {
            error!(query = %event.query, "Unexpected event data type on new block queue");
            return;
        };
        let header = &data.block.header;
        if header.height < 0 {
            error!(height = header.height, "Negative block height");
            return;
        }

        let base_fee = base_fee_from_events(&data.result_finalize_block.events);
        let miner = match self
            .resolver
            .validator_account(header.height, &header.proposer_address)
            .await
        {
            Ok(account) => account,
            Err(e) => {
                error!(
                    height = header.height,
                    proposer = %header.proposer_address,
                    error = %e,
                    "Failed to resolve validator account"
                );
                return;
            }
        };

        let rpc_header = RpcHeader {
            eth_header: eth_header_from_block(header, miner, base_fee),
            hash: header.hash(),
        };
        self.headers.append([rpc_header]);
        trace!(height = header.height, "Header appended");
    }

    fn on_tx(&self, event: ResultEvent) {
        if !event.has_attribute(EVM_TX_HASH_KEY) {
            trace!("Skipping transaction without EVM hash");
            return;
        }
        let EventData::Tx(data) = event.data else {
            error!(query = %event.query, "Unexpected event data type on transaction queue");
            return;
        };

        let tx_result = data.tx_result;
        let Ok(height) = u64::try_from(tx_result.height) else {
            error!(height = tx_result.height, "Negative transaction height");
            return;
        };

        match self
            .decoder
            .decode_logs(&tx_result.result.data, &tx_result.result.events, height)
        {
            Ok(logs) => {
                let count = logs.len();
                self.logs.append(logs);
                trace!(height, logs = count, "Logs appended");
            }
            Err(e) => error!(height, error = %e, "Failed to decode transaction logs"),
        }
    }
}
