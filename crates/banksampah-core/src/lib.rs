//! Domain core of the bank sampah (waste bank) backend: catalog, customers,
//! deposits that turn weighed waste into balance, withdrawals and stock.

pub mod config;
pub mod error;
pub mod ledger;
pub mod memory_store;
pub mod receipts;
pub mod security;
pub mod store;
pub mod types;

pub use config::{
    AuthConfig, ConfigManager, LoggingConfig, MailConfig, SecurityConfig, ServerConfig, Settings,
    StorageConfig,
};
pub use error::*;
pub use memory_store::{BankData, MemoryStore, DUPLICATE_PHONE};
pub use receipts::{
    HttpReceiptSender, LogReceiptSender, Receipt, ReceiptKind, ReceiptLine, ReceiptSender,
};
pub use store::*;
pub use types::*;
