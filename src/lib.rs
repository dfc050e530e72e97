//! Tasksweep: discover files under a prefix and run a task on each, with bounded concurrency,
//! retries, and a terminal error list.

pub mod admission;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod runner;
pub mod source;
pub mod sweep;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use admission::{Context, FixedTokenSource, TokenSource};
pub use dispatch::{Dispatcher, Termination};
pub use error::DispatchError;
pub use runner::Runner;
pub use source::{FileSource, ObjectLister};

use std::sync::Arc;

/// Result alias used by public tasksweep API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: build a [`Dispatcher`] over `source` and start processing.
///
/// Returns the dispatcher (for `errors()` and `summary()` once terminated) and the termination
/// handle. Fails only if the initial listing fails; nothing has started in that case.
///
/// ```ignore
/// let source = Arc::new(FileSource::new(Arc::new(LocalLister::new()), "/data/in"));
/// let (dispatcher, done) = tasksweep::process_all(&Context::background(), source, runner, Arc::new(FixedTokenSource::new(4)), 1)?;
/// done.wait();
/// for task in dispatcher.errors() { eprintln!("{task}"); }
/// ```
pub fn process_all(
    ctx: &Context,
    source: Arc<FileSource>,
    runner: Arc<dyn Runner>,
    tokens: Arc<dyn TokenSource>,
    retry_limit: usize,
) -> std::result::Result<(Arc<Dispatcher>, Termination), DispatchError> {
    let dispatcher = Arc::new(Dispatcher::new(source, runner, retry_limit));
    let termination = dispatcher.process_all(ctx, tokens)?;
    Ok((dispatcher, termination))
}
