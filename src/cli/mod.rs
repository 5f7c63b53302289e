//! Command-line interface for flacfetch.
//!
//! This module provides the `download`, `resolve`, `check-tools` and
//! `config` commands.

mod commands;

pub use commands::{Cli, Commands, run_command};
