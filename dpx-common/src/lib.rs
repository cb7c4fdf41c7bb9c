//! # DPX Common Library
//!
//! Shared code for the down-payment extract tooling:
//! - Error type shared by configuration and roster loading
//! - Bootstrap configuration (TOML) and its validation
//! - Partition roster
//! - Logging initialisation (console + durable file)
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod roster;
pub mod time;

pub use error::{Error, Result};
pub use roster::{Partition, Scenario};
