//! Domain module
//!
//! Core domain types: monetary primitives and journal postings.

pub mod amount;
pub mod posting;

pub use amount::{Amount, AmountError, Balance};
pub use posting::{
    is_system_account, AccountId, BadOrderType, Leg, OperationKind, OrderBy, Posting,
    PostingPair, HOUSE_ACCOUNT_ID, RESERVE_ACCOUNT_ID,
};
