//! Public and internal types for the tasksweep API and dispatcher.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// One entry returned by an [`ObjectLister`](crate::source::ObjectLister).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Full path of the object (e.g. `gs://bucket/dir/obj`, or an absolute file path).
    pub path: String,
    /// True for subdirectory placeholders ("common prefixes"); these are never dispatched.
    pub is_prefix: bool,
    /// Last modification time. `None` when the store did not report one.
    pub updated: Option<SystemTime>,
}

impl ObjectDescriptor {
    pub fn object(path: impl Into<String>, updated: Option<SystemTime>) -> Self {
        Self {
            path: path.into(),
            is_prefix: false,
            updated,
        }
    }

    pub fn prefix(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_prefix: true,
            updated: None,
        }
    }
}

/// Processing state of a single discovered file.
///
/// A record has exactly one owner at a time: the pending queue while waiting, the worker
/// thread while running, then the completion handler. It is never shared, so it needs no lock.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub(crate) path: String,
    pub(crate) failures: usize,
    pub(crate) last_error: Option<String>,
}

impl TaskRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            failures: 0,
            last_error: None,
        }
    }

    /// Full path to the file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Retries granted so far: failed attempts that were put back on the queue.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Detail of the most recent failed attempt, cleared when an attempt succeeds.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn succeeded(&self) -> bool {
        self.last_error.is_none()
    }

    pub(crate) fn record_attempt(&mut self, result: anyhow::Result<()>) {
        self.last_error = result.err().map(|e| format!("{e:#}"));
    }
}

impl fmt::Display for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} failures, {}",
            self.path,
            self.failures,
            self.last_error.as_deref().unwrap_or("<nil>")
        )
    }
}

/// How the completion handler classified one finished attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Succeeded,
    /// Failed, and put back on the end of the pending queue.
    Retrying,
    /// Failed with no retries left; moved to the terminal error list.
    Failed,
}

/// Counters kept by the dispatcher across all batches it has run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Runner invocations started (retries count again).
    pub started: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Which [`TokenSource`](crate::admission::TokenSource) the CLI builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionMode {
    /// Fixed number of concurrent tasks.
    #[default]
    Fixed,
    /// Grow from a floor up to `workers` while the CPU has headroom.
    Cpu,
}

/// Full options for a CLI sweep.
#[derive(Clone, Debug)]
pub struct SweepOpts {
    /// Directory whose files are the tasks.
    pub dir: PathBuf,
    /// Program and leading arguments; the task path is appended.
    pub command: Vec<String>,
    /// Hard cap on concurrently running tasks. When None, derived from thread count and FD limit.
    pub workers: Option<usize>,
    /// Retries per file after its first failure (0 = first failure is terminal).
    pub retry_limit: usize,
    pub admission: AdmissionMode,
    /// Tasks always admitted in cpu mode regardless of load.
    pub min_workers: usize,
    /// Short-window utilization (0.0-1.0) under which cpu mode admits another task.
    pub short_threshold: f64,
    /// Long-window utilization (0.0-1.0) under which cpu mode admits another task.
    pub long_threshold: f64,
    /// Stop admitting new tasks after this long.
    pub timeout: Option<Duration>,
    /// Re-list and run again every interval until cancelled.
    pub watch: Option<Duration>,
    /// Print the final report as JSON on stdout.
    pub json: bool,
    /// Show progress counter and debug logs.
    pub verbose: bool,
}

impl Default for SweepOpts {
    fn default() -> Self {
        use crate::utils::config::{AdaptiveDefaults, DEFAULT_RETRY_LIMIT};
        Self {
            dir: PathBuf::from("."),
            command: Vec::new(),
            workers: None,
            retry_limit: DEFAULT_RETRY_LIMIT,
            admission: AdmissionMode::default(),
            min_workers: AdaptiveDefaults::MIN_TOKENS,
            short_threshold: AdaptiveDefaults::SHORT_THRESHOLD,
            long_threshold: AdaptiveDefaults::LONG_THRESHOLD,
            timeout: None,
            watch: None,
            json: false,
            verbose: false,
        }
    }
}
