//! Command-line interface for forumkit.
//!
//! Operates on a RocksDB data directory and prints results as JSON.

pub mod args;
pub mod commands;
pub mod utils;

use crate::forum::OpContext;
use crate::Result;
use std::process;

pub use args::{Command, Invocation};
pub use commands::execute;
pub use utils::*;

/// Main entry point for the CLI application
pub fn run() -> Result<()> {
    // Parse command line arguments
    let invocation = match args::parse_args() {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            eprintln!("Run 'forumkit help' for usage.");
            process::exit(1);
        }
    };

    if invocation.command == Command::Help {
        args::print_usage();
        return Ok(());
    }

    let actor = resolve_actor(invocation.actor)?;
    let engine = open_engine(&get_data_dir())?;

    match commands::execute(&engine, OpContext::new(actor), invocation.command) {
        Ok(value) => print_json(&value),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
