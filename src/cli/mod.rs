//! Command-line front end
//!
//! Runs the two-step import flow against an in-memory host, with staged
//! uploads kept on disk so `stage` and `run` can be separate invocations.

pub mod commands;
pub mod error;

pub use error::CliError;
