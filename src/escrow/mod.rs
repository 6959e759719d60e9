//! Escrow workflow
//!
//! Reservation, revenue recognition and refund of service orders. Each step
//! composes a nested ledger transfer with a bookkeeping row and commits both
//! or neither.

mod commands;
mod repository;
mod reservation_handler;
mod revenue_handler;
mod state;
mod unreservation_handler;

pub use commands::*;
pub use reservation_handler::ReservationHandler;
pub use revenue_handler::RevenueHandler;
pub use state::{EscrowState, ExpenseOperation, OrderKey, OrderRecords};
pub use unreservation_handler::UnreservationHandler;
