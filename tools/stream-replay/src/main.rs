//! stream-replay: drives the RPC event streams with synthetic traffic.
//!
//! Publishes blocks and EVM transactions on an in-memory event bus, feeds
//! pending transaction hashes through the admission listener, and reports
//! what concurrent readers of each stream observed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use qc_rpc_stream::{
    tx_log_event, BoundedEventStream, Cursor, EvmLogDecoder, RpcStreams, StaticValidatorAccounts,
    StreamConfig,
};
use quantum_telemetry::{init_logging, TelemetryConfig};
use shared_bus::{EventDataNewBlock, EventDataTx, EventPublisher, InMemoryEventBus};
use shared_types::{
    Address, Block, BlockHeader, BlockId, ConsensusAddress, Event, ExecTxResult, Hash, Log,
    ResultFinalizeBlock, TxResult, U64,
};
use tokio::sync::watch;
use tracing::{info, warn};

/// Replay synthetic consensus traffic through the RPC event streams
#[derive(Parser, Debug)]
#[command(name = "stream-replay")]
#[command(about = "Replay synthetic blocks and transactions through the RPC event streams")]
struct Args {
    /// Number of blocks to publish
    #[arg(short, long, default_value = "20")]
    blocks: u64,

    /// EVM transactions per block
    #[arg(long, default_value = "4")]
    txs_per_block: u64,

    /// Logs emitted per transaction
    #[arg(long, default_value = "2")]
    logs_per_tx: u64,

    /// Pending transaction hashes ingested per block
    #[arg(long, default_value = "8")]
    pending_per_block: u64,

    /// JSON file with stream configuration (defaults otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

/// What one reader saw.
#[derive(Debug, Default)]
struct ReaderStats {
    received: u64,
    skipped: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env().with_service_name("stream-replay");
    telemetry.json_logs |= args.json_logs;
    init_logging(&telemetry).context("Failed to initialize logging")?;

    let config = load_config(args.config.as_deref())?;
    config.validate().context("Invalid stream configuration")?;

    let proposer = ConsensusAddress(rand::random());
    let miner = Address::from(rand::random::<[u8; 20]>());
    let bus = Arc::new(InMemoryEventBus::new());
    let streams = RpcStreams::new(
        bus.clone(),
        Arc::new(EvmLogDecoder::new()),
        Arc::new(StaticValidatorAccounts::new().with_account(proposer, miner)),
        config,
    );

    let headers = streams.header_stream().await?;
    let logs = streams.log_stream().await?;
    let pending = streams.pending_tx_stream();
    let listener = streams.pending_tx_listener();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let header_reader = tokio::spawn(drain(Arc::clone(&headers), shutdown_rx.clone()));
    let log_reader = tokio::spawn(drain(Arc::clone(&logs), shutdown_rx.clone()));
    let pending_reader = tokio::spawn(drain(Arc::clone(&pending), shutdown_rx));

    let started = Instant::now();
    for height in 1..=args.blocks {
        bus.publish_new_block(new_block(height, proposer)).await;
        for index in 0..args.txs_per_block {
            bus.publish_tx(evm_tx(height, index, args.logs_per_tx)?).await;
        }
        for _ in 0..args.pending_per_block {
            listener(Hash::from(rand::random::<[u8; 32]>()));
        }
        tokio::task::yield_now().await;
    }

    let expected_logs = args.blocks * args.txs_per_block * args.logs_per_tx;
    if !wait_for(&headers, args.blocks).await || !wait_for(&logs, expected_logs).await {
        warn!(
            headers = headers.tail().position(),
            logs = logs.tail().position(),
            "Streams did not catch up before the deadline"
        );
    }

    let _ = shutdown_tx.send(true);
    streams.close().await?;

    let header_stats = header_reader.await?;
    let log_stats = log_reader.await?;
    let pending_stats = pending_reader.await?;

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        published = bus.events_published(),
        dropped = bus.events_dropped(),
        "Replay finished"
    );
    report("headers", &header_stats, &headers);
    report("logs", &log_stats, &logs);
    report("pending_txs", &pending_stats, &pending);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<StreamConfig> {
    let Some(path) = path else {
        return Ok(StreamConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Follows `stream` from the origin until shutdown, then drains it.
async fn drain<T: Clone>(
    stream: Arc<BoundedEventStream<T>>,
    mut shutdown: watch::Receiver<bool>,
) -> ReaderStats {
    let mut stats = ReaderStats::default();
    let mut cursor = Cursor::ORIGIN;

    loop {
        let batch = if *shutdown.borrow() {
            stream.read(cursor, 256)
        } else {
            stream.read_blocking(cursor, 256, shutdown.changed()).await
        };
        stats.skipped += batch.skipped(cursor);
        stats.received += batch.len() as u64;
        cursor = batch.next;

        if batch.is_empty() && *shutdown.borrow() {
            break;
        }
    }
    stats
}

/// Waits until `count` items have been appended, up to five seconds.
async fn wait_for<T: Clone>(stream: &BoundedEventStream<T>, count: u64) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while stream.tail().position() < count {
        if Instant::now() >= deadline {
            return false;
        }
        stream
            .read_timeout(stream.tail(), 1, Duration::from_millis(50))
            .await;
    }
    true
}

fn report<T>(name: &str, stats: &ReaderStats, stream: &BoundedEventStream<T>) {
    info!(
        stream = name,
        appended = stream.tail().position(),
        retained = stream.len(),
        capacity = stream.capacity(),
        received = stats.received,
        skipped = stats.skipped,
        "Stream summary"
    );
}

fn new_block(height: u64, proposer: ConsensusAddress) -> EventDataNewBlock {
    let base_fee = 1_000_000_000u64 + height * 1_000;
    EventDataNewBlock {
        block: Block {
            header: BlockHeader {
                chain_id: "quantum_9000-1".to_string(),
                height: height as i64,
                time: 1_700_000_000 + height,
                last_block_id: BlockId {
                    hash: rand::random::<[u8; 32]>().to_vec(),
                },
                data_hash: rand::random::<[u8; 32]>().to_vec(),
                validators_hash: vec![0u8; 32],
                app_hash: rand::random::<[u8; 32]>().to_vec(),
                proposer_address: proposer,
            },
            txs: Vec::new(),
        },
        result_finalize_block: ResultFinalizeBlock {
            events: vec![Event::new("fee_market").with_attribute("base_fee", base_fee.to_string())],
            tx_results: Vec::new(),
        },
    }
}

fn evm_tx(height: u64, index: u64, log_count: u64) -> Result<EventDataTx> {
    let tx_hash = Hash::from(rand::random::<[u8; 32]>());
    let logs: Vec<Log> = (0..log_count)
        .map(|i| Log {
            address: Address::from(rand::random::<[u8; 20]>()),
            topics: vec![Hash::from(rand::random::<[u8; 32]>())],
            data: rand::random::<[u8; 32]>().to_vec().into(),
            transaction_hash: tx_hash,
            transaction_index: U64::from(index),
            log_index: U64::from(index * log_count + i),
            ..Default::default()
        })
        .collect();

    Ok(EventDataTx {
        tx_result: TxResult {
            height: height as i64,
            index: index as u32,
            tx: tx_hash.as_bytes().to_vec(),
            result: ExecTxResult {
                events: vec![
                    Event::new("message").with_attribute("module", "evm"),
                    Event::new("ethereum_tx").with_attribute("ethereumTxHash", format!("{tx_hash:?}")),
                    tx_log_event(&logs)?,
                ],
                ..Default::default()
            },
        },
    })
}
