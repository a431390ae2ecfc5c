//! expwatch - experiment folder watcher
//!
//! Watches a folder for new experiment subfolders, claims each one exactly
//! once and checks that its source and reference sentence files have the
//! same number of lines.

pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod lock;
pub mod report;
pub mod sentences;
pub mod validator;

pub use error::{Result, WatchError};
