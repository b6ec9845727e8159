mod error;
mod eth_cli;
mod gateway;
mod txn_builder;

#[cfg(test)]
pub mod mock;

pub use error::{ChainError, Transience};
pub use eth_cli::{EthHttpCli, RetryConfig};
pub use gateway::{Confirmation, Gateway, ReceiptSummary};
pub use txn_builder::TxnBuilder;
