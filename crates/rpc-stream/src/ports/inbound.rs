//! Inbound Ports (Driving Ports)

use shared_types::Hash;
use std::sync::Arc;

/// Callback the transaction-admission path invokes with the hash of every
/// transaction that passes its pre-execution checks.
///
/// Obtained from [`RpcStreams::pending_tx_listener`](crate::RpcStreams::pending_tx_listener).
/// Invocation appends to the pending-transaction stream without blocking.
pub type PendingTxListener = Arc<dyn Fn(Hash) + Send + Sync>;
