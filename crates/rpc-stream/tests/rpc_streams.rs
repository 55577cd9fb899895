//! End-to-end tests driving `RpcStreams` over the in-memory event bus.

use async_trait::async_trait;
use qc_rpc_stream::{
    evm_tx_query, new_block_query, tx_log_event, BoundedEventStream, Cursor, EventsClient, EvmLogDecoder, RpcStreams,
    StaticValidatorAccounts, StreamConfig, StreamError, StreamLimits, StreamState,
};
use shared_bus::{
    flatten_events, EventData, EventDataNewBlock, EventDataTx, EventPublisher, InMemoryEventBus,
    Query, ResultEvent, SubscriptionError, EVENT_NEW_BLOCK, EVENT_TX,
};
use shared_types::{
    Address, Block, BlockHeader, BlockId, ConsensusAddress, Event, ExecTxResult, Hash, Log,
    ResultFinalizeBlock, TxResult, U256, U64,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const KNOWN_VALIDATOR: ConsensusAddress = ConsensusAddress([0x01; 20]);
const UNKNOWN_VALIDATOR: ConsensusAddress = ConsensusAddress([0x02; 20]);
const WAIT: Duration = Duration::from_secs(2);

fn miner() -> Address {
    Address::repeat_byte(0x77)
}

fn accounts() -> Arc<StaticValidatorAccounts> {
    Arc::new(StaticValidatorAccounts::new().with_account(KNOWN_VALIDATOR, miner()))
}

fn manager(client: Arc<dyn EventsClient>, config: StreamConfig) -> RpcStreams {
    RpcStreams::new(client, Arc::new(EvmLogDecoder::new()), accounts(), config)
}

fn block(height: i64, proposer: ConsensusAddress) -> EventDataNewBlock {
    EventDataNewBlock {
        block: Block {
            header: BlockHeader {
                chain_id: "quantum_9000-1".to_string(),
                height,
                time: 1_700_000_000 + height as u64,
                last_block_id: BlockId {
                    hash: vec![height as u8; 32],
                },
                data_hash: vec![],
                validators_hash: vec![0x33; 32],
                app_hash: vec![0x44; 32],
                proposer_address: proposer,
            },
            txs: vec![],
        },
        result_finalize_block: ResultFinalizeBlock {
            events: vec![Event::new("fee_market").with_attribute("base_fee", "1000000000")],
            tx_results: vec![],
        },
    }
}

fn log(tx: u8, index: u64) -> Log {
    Log {
        address: Address::repeat_byte(0xAA),
        topics: vec![Hash::repeat_byte(tx)],
        data: vec![tx, index as u8].into(),
        transaction_hash: Hash::repeat_byte(tx),
        log_index: U64::from(index),
        ..Default::default()
    }
}

fn tx_with_events(height: i64, events: Vec<Event>) -> EventDataTx {
    EventDataTx {
        tx_result: TxResult {
            height,
            index: 0,
            tx: vec![height as u8],
            result: ExecTxResult {
                events,
                ..Default::default()
            },
        },
    }
}

fn evm_tx(height: i64, tx: u8, log_count: u64) -> EventDataTx {
    let logs: Vec<Log> = (0..log_count).map(|i| log(tx, i)).collect();
    tx_with_events(
        height,
        vec![
            Event::new("message").with_attribute("module", "evm"),
            Event::new("ethereum_tx")
                .with_attribute("ethereumTxHash", format!("{:?}", Hash::repeat_byte(tx))),
            tx_log_event(&logs).unwrap(),
        ],
    )
}

/// Reads until `count` items arrived after `from`, or fails after `WAIT`.
async fn collect<T: Clone>(stream: &BoundedEventStream<T>, from: Cursor, count: usize) -> Vec<T> {
    let mut items = Vec::new();
    let mut cursor = from;
    let deadline = tokio::time::Instant::now() + WAIT;
    while items.len() < count {
        let batch = stream
            .read_blocking(cursor, count - items.len(), tokio::time::sleep_until(deadline))
            .await;
        assert!(
            !batch.is_empty(),
            "timed out with {} of {} items",
            items.len(),
            count
        );
        cursor = batch.next;
        items.extend(batch.items);
    }
    items
}

#[tokio::test]
async fn test_block_and_tx_scenario() {
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = manager(bus.clone(), StreamConfig::default());

    let headers = streams.header_stream().await.unwrap();
    let logs = streams.log_stream().await.unwrap();

    bus.publish_new_block(block(1, KNOWN_VALIDATOR)).await;
    bus.publish_tx(evm_tx(1, 0xA1, 2)).await;

    let got_headers = collect(&headers, Cursor::ORIGIN, 1).await;
    let got_logs = collect(&logs, Cursor::ORIGIN, 2).await;

    let header = &got_headers[0];
    assert_eq!(header.eth_header.number, U256::from(1));
    assert_eq!(header.eth_header.miner, miner());
    assert_eq!(header.eth_header.base_fee, Some(U256::from(1_000_000_000u64)));
    assert_eq!(header.hash, block(1, KNOWN_VALIDATOR).block.header.hash());

    assert_eq!(got_logs[0].log_index, U64::from(0));
    assert_eq!(got_logs[1].log_index, U64::from(1));
    assert!(got_logs.iter().all(|l| l.block_number == U64::from(1)));

    assert!(streams.pending_tx_stream().is_empty());
    streams.close().await.unwrap();
}

#[tokio::test]
async fn test_eviction_scenario_through_manager() {
    let config = StreamConfig {
        headers: StreamLimits::new(2, 4),
        ..StreamConfig::default()
    };
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = manager(bus.clone(), config);
    let headers = streams.header_stream().await.unwrap();

    for height in 1..=6 {
        bus.publish_new_block(block(height, KNOWN_VALIDATOR)).await;
    }
    // The sixth header is the last to arrive; wait for it.
    let deadline = tokio::time::Instant::now() + WAIT;
    while headers.tail() < Cursor(6) {
        assert!(tokio::time::Instant::now() < deadline, "headers not delivered");
        headers.read_timeout(headers.tail(), 1, Duration::from_millis(50)).await;
    }

    let batch = headers.read(Cursor::ORIGIN, 10);
    let heights: Vec<U256> = batch.items.iter().map(|h| h.eth_header.number).collect();
    assert_eq!(heights, (3..=6).map(U256::from).collect::<Vec<_>>());
    assert_eq!(batch.start, Cursor(2));

    streams.close().await.unwrap();
}

#[tokio::test]
async fn test_non_evm_transactions_are_filtered() {
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = manager(bus.clone(), StreamConfig::default());
    let logs = streams.log_stream().await.unwrap();

    // Wrong module: never reaches the subscription.
    let bank = tx_with_events(
        1,
        vec![
            Event::new("message").with_attribute("module", "bank"),
            tx_log_event(&[log(0xB0, 0)]).unwrap(),
        ],
    );
    assert_eq!(bus.publish_tx(bank).await, 0);

    // EVM module but no ethereum tx hash: delivered, then skipped.
    let no_hash = tx_with_events(
        1,
        vec![
            Event::new("message").with_attribute("module", "evm"),
            tx_log_event(&[log(0xB1, 0)]).unwrap(),
        ],
    );
    assert_eq!(bus.publish_tx(no_hash).await, 1);

    bus.publish_tx(evm_tx(2, 0xC0, 1)).await;

    let got = collect(&logs, Cursor::ORIGIN, 1).await;
    assert_eq!(got[0].transaction_hash, Hash::repeat_byte(0xC0));
    assert_eq!(logs.len(), 1);

    streams.close().await.unwrap();
}

#[tokio::test]
async fn test_bad_events_do_not_stop_processing() {
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = manager(bus.clone(), StreamConfig::default());
    let headers = streams.header_stream().await.unwrap();
    let logs = streams.log_stream().await.unwrap();

    // Unresolvable proposer: skipped.
    bus.publish_new_block(block(1, UNKNOWN_VALIDATOR)).await;
    bus.publish_new_block(block(2, KNOWN_VALIDATOR)).await;

    // Undecodable logs: skipped.
    let mut malformed = evm_tx(1, 0xD0, 0);
    malformed
        .tx_result
        .result
        .events
        .push(Event::new("tx_log").with_attribute("txLog", "{oops"));
    bus.publish_tx(malformed).await;
    // Negative height: skipped.
    bus.publish_tx(evm_tx(-1, 0xD1, 1)).await;
    bus.publish_tx(evm_tx(2, 0xD2, 3)).await;

    let got_headers = collect(&headers, Cursor::ORIGIN, 1).await;
    assert_eq!(got_headers[0].eth_header.number, U256::from(2));
    assert_eq!(headers.len(), 1);

    let got_logs = collect(&logs, Cursor::ORIGIN, 3).await;
    assert!(got_logs
        .iter()
        .all(|l| l.transaction_hash == Hash::repeat_byte(0xD2)));
    assert_eq!(logs.len(), 3);

    assert_eq!(streams.state(), StreamState::Running);
    streams.close().await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = manager(bus.clone(), StreamConfig::default());

    // Never started: nothing to tear down.
    streams.close().await.unwrap();
    assert_eq!(streams.state(), StreamState::Uninitialized);

    streams.header_stream().await.unwrap();
    timeout(WAIT, streams.close()).await.expect("timeout").unwrap();
    assert_eq!(streams.state(), StreamState::Closed);
    assert_eq!(bus.subscription_count(), 0);

    timeout(WAIT, streams.close()).await.expect("timeout").unwrap();

    // Streams stay readable after close and do not resubscribe.
    let headers = streams.header_stream().await.unwrap();
    assert!(headers.is_empty());
    assert_eq!(bus.subscription_count(), 0);
}

#[tokio::test]
async fn test_close_after_feed_shutdown() {
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = manager(bus.clone(), StreamConfig::default());
    streams.log_stream().await.unwrap();

    bus.shutdown();
    timeout(WAIT, streams.close()).await.expect("timeout").unwrap();
    assert_eq!(streams.state(), StreamState::Closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_access_subscribes_once() {
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = Arc::new(manager(bus.clone(), StreamConfig::default()));

    let callers: Vec<_> = (0..16)
        .map(|i| {
            let streams = Arc::clone(&streams);
            tokio::spawn(async move {
                if i % 2 == 0 {
                    streams.header_stream().await.map(|_| ())
                } else {
                    streams.log_stream().await.map(|_| ())
                }
            })
        })
        .collect();
    for caller in callers {
        caller.await.unwrap().unwrap();
    }

    assert_eq!(bus.subscription_count(), 2);
    streams.close().await.unwrap();
}

#[tokio::test]
async fn test_blocked_reader_wakes_on_new_header() {
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = manager(bus.clone(), StreamConfig::default());
    let headers = streams.header_stream().await.unwrap();

    let reader = {
        let headers = Arc::clone(&headers);
        tokio::spawn(async move { headers.read_timeout(headers.tail(), 10, WAIT).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.publish_new_block(block(9, KNOWN_VALIDATOR)).await;

    let batch = reader.await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.items[0].eth_header.number, U256::from(9));

    streams.close().await.unwrap();
}

#[tokio::test]
async fn test_pending_listener_is_independent_of_feed() {
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = manager(bus.clone(), StreamConfig::default());
    let listener = streams.pending_tx_listener();

    let writers: Vec<_> = (0..4u8)
        .map(|i| {
            let listener = Arc::clone(&listener);
            std::thread::spawn(move || listener(Hash::repeat_byte(i)))
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(streams.pending_tx_stream().len(), 4);
    assert_eq!(streams.state(), StreamState::Uninitialized);
    assert_eq!(bus.subscription_count(), 0);
}

/// Feed wrapper whose `unsubscribe_all` can be made to fail.
struct StubbornClient {
    bus: InMemoryEventBus,
    refuse: AtomicBool,
}

#[async_trait]
impl EventsClient for StubbornClient {
    async fn subscribe(
        &self,
        subscriber: &str,
        query: &Query,
        capacity: usize,
    ) -> Result<mpsc::Receiver<ResultEvent>, SubscriptionError> {
        self.bus.subscribe(subscriber, query, capacity).await
    }

    async fn unsubscribe_all(&self, subscriber: &str) -> Result<(), SubscriptionError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SubscriptionError::Closed);
        }
        self.bus.unsubscribe_all(subscriber).await
    }
}

#[tokio::test]
async fn test_failed_close_can_be_retried() {
    let client = Arc::new(StubbornClient {
        bus: InMemoryEventBus::new(),
        refuse: AtomicBool::new(true),
    });
    let streams = manager(client.clone(), StreamConfig::default());
    let headers = streams.header_stream().await.unwrap();

    let err = streams.close().await.unwrap_err();
    assert!(matches!(err, StreamError::Unsubscribe { .. }));
    assert_eq!(streams.state(), StreamState::Running);

    // Still processing events.
    client
        .bus
        .publish_new_block(block(3, KNOWN_VALIDATOR))
        .await;
    collect(&headers, Cursor::ORIGIN, 1).await;

    client.refuse.store(false, Ordering::SeqCst);
    timeout(WAIT, streams.close()).await.expect("timeout").unwrap();
    assert_eq!(streams.state(), StreamState::Closed);
    assert_eq!(client.bus.subscription_count(), 0);
}

#[tokio::test]
async fn test_publish_counts_match_subscriptions() {
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = manager(bus.clone(), StreamConfig::default());
    streams.header_stream().await.unwrap();

    let delivered = bus
        .publish(
            EventData::NewBlock(block(1, KNOWN_VALIDATOR)),
            Default::default(),
        )
        .await;
    assert_eq!(delivered, 1);
    assert_eq!(bus.events_published(), 1);

    streams.close().await.unwrap();
}

/// Feed handing out queues whose sending side the test keeps.
#[derive(Default)]
struct ScriptedClient {
    senders: parking_lot::Mutex<Vec<(String, mpsc::Sender<ResultEvent>)>>,
}

impl ScriptedClient {
    fn sender(&self, query: &Query) -> mpsc::Sender<ResultEvent> {
        let query = query.to_string();
        self.senders
            .lock()
            .iter()
            .find(|(q, _)| *q == query)
            .map(|(_, tx)| tx.clone())
            .expect("no subscription for query")
    }
}

#[async_trait]
impl EventsClient for ScriptedClient {
    async fn subscribe(
        &self,
        _subscriber: &str,
        query: &Query,
        capacity: usize,
    ) -> Result<mpsc::Receiver<ResultEvent>, SubscriptionError> {
        let (tx, rx) = mpsc::channel(capacity);
        self.senders.lock().push((query.to_string(), tx));
        Ok(rx)
    }

    async fn unsubscribe_all(&self, _subscriber: &str) -> Result<(), SubscriptionError> {
        self.senders.lock().clear();
        Ok(())
    }
}

fn delivered(query: &Query, data: EventData, events: BTreeMap<String, Vec<String>>) -> ResultEvent {
    ResultEvent {
        query: query.to_string(),
        data,
        events,
    }
}

#[tokio::test]
async fn test_mismatched_payloads_are_skipped() {
    let client = Arc::new(ScriptedClient::default());
    let streams = manager(client.clone(), StreamConfig::default());
    let headers = streams.header_stream().await.unwrap();
    let logs = streams.log_stream().await.unwrap();

    let block_query = new_block_query();
    let tx_query = evm_tx_query();
    let blocks = client.sender(&block_query);
    let txs = client.sender(&tx_query);

    // A transaction on the block queue, a bare header on the transaction queue.
    let stray_tx = evm_tx(1, 0xB1, 1);
    let stray_tx_events = flatten_events(EVENT_TX, &stray_tx.tx_result.result.events);
    blocks
        .send(delivered(&block_query, EventData::Tx(stray_tx), stray_tx_events.clone()))
        .await
        .unwrap();
    txs.send(delivered(
        &tx_query,
        EventData::NewBlockHeader(block(1, KNOWN_VALIDATOR).block.header),
        stray_tx_events,
    ))
    .await
    .unwrap();

    // Well-formed events after them still land.
    blocks
        .send(delivered(
            &block_query,
            EventData::NewBlock(block(2, KNOWN_VALIDATOR)),
            flatten_events(EVENT_NEW_BLOCK, &[]),
        ))
        .await
        .unwrap();
    let good_tx = evm_tx(2, 0xB2, 2);
    let good_tx_events = flatten_events(EVENT_TX, &good_tx.tx_result.result.events);
    txs.send(delivered(&tx_query, EventData::Tx(good_tx), good_tx_events))
        .await
        .unwrap();

    let got_headers = collect(&headers, Cursor::ORIGIN, 1).await;
    assert_eq!(got_headers[0].eth_header.number, U256::from(2));
    let got_logs = collect(&logs, Cursor::ORIGIN, 2).await;
    assert!(got_logs.iter().all(|l| l.transaction_hash == Hash::repeat_byte(0xB2)));
    assert_eq!(headers.len(), 1);
    assert_eq!(logs.len(), 2);

    timeout(WAIT, streams.close()).await.expect("timeout").unwrap();
}
