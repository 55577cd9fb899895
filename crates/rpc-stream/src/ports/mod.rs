//! Ports Layer
//!
//! - Driving Ports (inbound): capabilities handed to other components
//! - Driven Ports (outbound): the event feed and the two collaborators the
//!   demultiplexer calls per event

pub mod inbound;
pub mod outbound;

pub use inbound::PendingTxListener;
pub use outbound::{EventsClient, TxLogDecoder, ValidatorAccountResolver};
