pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use crate::config::SyncSettings;
pub use crate::core::{Scheduler, SyncEngine, SyncOutcome, SyncStats};
pub use crate::error::{Result, SyncError};
