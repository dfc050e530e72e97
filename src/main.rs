//! Tasksweep CLI: run a command on every file in a directory.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use tasksweep::engine::arg_parser::Cli;
use tasksweep::engine::handle_run;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
