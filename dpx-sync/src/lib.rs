//! # dpx-sync
//!
//! Down-payment reconciliation: reads sales orders, accounting documents and
//! billing documents from the OData service, writes one extract file per
//! partition, and submits extract rows downstream with archive-on-success.

pub mod api;
pub mod archive;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod fiscal_year;
pub mod flag_filter;
pub mod merge;
pub mod models;
pub mod odata;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod stages;

pub use error::{Result, SyncError};
pub use pipeline::{Pipeline, RunMode, RunSummary};
