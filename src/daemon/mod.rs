//! Daemon Core - watch loop, tick bookkeeping, and crash recovery
//!
//! The daemon is the long-running process that:
//! - Polls the root folder for experiments without a lock artifact
//! - Claims, validates and reports each one on a bounded worker pool
//! - Recovers claims left behind by a killed watcher

pub mod recovery;
pub mod tick;
pub mod watcher;

pub use recovery::*;
pub use tick::*;
pub use watcher::*;
