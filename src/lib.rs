//! # Ledger Engine
//!
//! A double-entry bookkeeping engine: journal-entry validation and posting
//! lifecycle, account balances under debit/credit normal-balance rules,
//! financial statements derived from posted lines, and bank-statement
//! reconciliation.
//!
//! ## Features
//!
//! - **Journal engine**: DRAFT → POSTED → VOID lifecycle with at-most-once posting
//! - **Account registry**: hierarchical chart of accounts with guarded deactivation
//! - **Financial reporting**: trial balance, profit and loss, balance sheet, general ledger and dashboard
//! - **Reconciliation**: 1:1 matching of bank statement lines to posted journal lines
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use ledger_engine::{patterns, Ledger, MemoryStorage};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//! use std::str::FromStr;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let ledger = Ledger::new(MemoryStorage::new());
//! let chart = ledger.setup_standard_chart_of_accounts().await.unwrap();
//!
//! let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let input = patterns::owner_investment(
//!     date,
//!     "Initial capital",
//!     chart["cash"].id,
//!     chart["owners_equity"].id,
//!     BigDecimal::from_str("5000.00").unwrap(),
//! )
//! .unwrap();
//! ledger.record_entry(input).await.unwrap();
//!
//! let trial_balance = ledger.trial_balance(date).await.unwrap();
//! assert!(trial_balance.is_balanced);
//! # });
//! # }
//! ```

pub mod config;
pub mod ledger;
pub mod reconciliation;
pub mod reports;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{DashboardConfig, LedgerConfig, ValidationConfig};
pub use ledger::{
    AccountManager, BalanceCalculator, JournalEntryBuilder, JournalManager, Ledger,
    LedgerIntegrityReport,
};
pub use reconciliation::{ReconciliationEngine, ReconciliationSummary, UnreconciledStatements};
pub use reports::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStorage;

// Re-export posting patterns for convenience
pub use ledger::journal::patterns;
