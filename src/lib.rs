//! Tracks how long a host application session has been in use, keeps a cumulative total and
//! per-day totals across restarts, and recovers sessions cut short by a crash or a forced kill
//! without counting any interval twice.
//!

pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod storage;
pub mod tracker;
pub mod utils;
