//! Command line interface for guibender-dist.
//!
//! One command per channel (build RPM, build Debian, install via index with
//! a core-vs-full profile flag), exit status 0 only when the selected
//! channel produced its artifact or completed its install.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}
