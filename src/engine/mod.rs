//! Engine module for the CLI: argument parsing, run handler, progress

pub mod arg_parser;
pub mod handlers;
pub mod progress;

pub use arg_parser::Cli;
pub use handlers::{build_opts, handle_run};
pub use progress::{ProgressBar, completion_observer, create_counter};
