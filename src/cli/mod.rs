//! CLI module for expwatch - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for watching a folder,
//! checking a single experiment and managing claims.

pub mod commands;

pub use commands::Cli;
