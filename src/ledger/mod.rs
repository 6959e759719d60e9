//! Ledger core
//!
//! Append-only posting journal, incremental balance rollup and the
//! serializable transaction coordinator that both run under.

mod error;
mod journal;
pub mod rollup;
pub mod session;

pub use error::LedgerError;
pub(crate) use error::is_unique_violation;
pub use journal::{Ledger, PostingIds};
pub use session::Session;
