//! Ledger module containing account management, balances and the journal engine

pub mod account;
pub mod balance;
pub mod core;
pub mod journal;

pub use account::*;
pub use balance::*;
pub use self::core::*;
pub use journal::*;
