use clap::Parser;
use std::path::PathBuf;

use crate::AdmissionMode;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Run a command on every file in a directory, with bounded concurrency and retries.
#[derive(Clone, Parser)]
#[command(name = "tasksweep")]
#[command(about = "Run COMMAND on each file in DIR (path appended); retry failures, report the ones that never succeed.")]
pub struct Cli {
    /// Directory whose files are the tasks. Default: current directory.
    #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Command to run per file, after `--`. The file path is appended as the last argument.
    #[arg(value_name = "COMMAND", last = true)]
    pub command: Vec<String>,

    /// Maximum concurrently running tasks. Default: available threads, capped by the FD limit.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Retries per file after its first failure (0 = first failure is final).
    #[arg(long, short = 'r')]
    pub retries: Option<usize>,

    /// Admission mode: fixed concurrency, or grow with CPU headroom up to --workers.
    #[arg(long, short = 'a', value_enum)]
    pub admission: Option<AdmissionMode>,

    /// Tasks always admitted in cpu mode.
    #[arg(long)]
    pub min_workers: Option<usize>,

    /// Stop starting new tasks after this many seconds (running ones finish).
    #[arg(long, short = 't')]
    pub timeout: Option<u64>,

    /// Keep going: re-list DIR every SECS seconds and run new files, until Ctrl+C.
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// Print the final report as JSON.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub json: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
