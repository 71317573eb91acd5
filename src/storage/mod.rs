//!  Storage is split in two, with different lifetimes.
//!   - [log::PersistentLog] is the single source of truth for accumulated time. It lives next to
//!     the application and is rewritten wholesale on every commit.
//!   - [checkpoint::CheckpointStore] holds at most one marker of a session in progress. It must
//!     outlive the tracked process and only exists to recover from crashes.
//!   - [ledger] folds a session into per-day totals.

pub mod checkpoint;
pub mod entities;
pub mod ledger;
pub mod log;
