//! Command-line interface for callforge.
//!
//! Provides the `serve` daemon plus one-shot commands for placing,
//! scheduling and inspecting calls.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
