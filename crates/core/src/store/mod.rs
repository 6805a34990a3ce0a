//! LocalStateStore: one embedded database per managed instance.
//!
//! Holds cached content entries, the transient queue table and the
//! insert-if-absent persistent queue.

mod sqlite;
mod types;

pub use sqlite::LocalStateStore;
pub use types::*;
