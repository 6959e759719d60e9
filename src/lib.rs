//! Escrow Ledger Library
//!
//! Double-entry ledger with serializable transactions, incremental balance
//! rollup and an escrow workflow for service orders.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod escrow;
pub mod ledger;
pub mod reporting;

mod error;

pub use config::Config;
pub use domain::{AccountId, Amount, AmountError, Balance, OrderBy, Posting};
pub use error::AppError;
pub use ledger::{Ledger, LedgerError, PostingIds, Session};
