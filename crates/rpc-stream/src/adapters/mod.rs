//! Adapters Layer
//!
//! Default implementations of the outbound ports.

pub mod evm_decoder;
pub mod validator_accounts;

pub use evm_decoder::{tx_log_event, EvmLogDecoder, TX_LOG_ATTRIBUTE, TX_LOG_EVENT};
pub use validator_accounts::StaticValidatorAccounts;
