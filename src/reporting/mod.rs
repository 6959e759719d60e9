//! Reporting module
//!
//! Read-side queries over the journal: account history and the monthly
//! revenue report.

mod service;

pub use service::{render_csv, ReportRow, ReportingService, MAX_HISTORY_LIMIT};
