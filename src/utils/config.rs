//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

use crate::utils::fd_limit::max_workers_by_fd_limit;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    settings_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                settings_filename: format!(".{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Per-directory settings file, e.g. `.tasksweep.toml`.
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }
}

// ---- Dispatch ----

/// Retries per file after its first failure.
pub const DEFAULT_RETRY_LIMIT: usize = 1;

/// Subtracted from the local clock when recording a listing checkpoint.
pub const CLOCK_SKEW: Duration = Duration::from_secs(1);

/// How often a launch loop waiting on in-flight tasks re-checks its context.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const WORKER_THREAD_NAME: &str = "tasksweep-worker";

/// Bytes of a failed command's stderr kept in the task's error.
pub const STDERR_TAIL_BYTES: usize = 2048;

// ---- Worker threads ----

/// Limits for the number of concurrently running tasks.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Never go below this many workers.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Default worker count: one per available thread, capped by the FD limit.
    pub fn default_workers(&self) -> usize {
        let workers = match max_workers_by_fd_limit() {
            Some(cap) => self.all_threads.min(cap),
            None => self.all_threads,
        };
        workers.max(self.floor)
    }
}

// ---- Adaptive admission ----

/// Defaults for cpu-mode admission.
pub struct AdaptiveDefaults;

impl AdaptiveDefaults {
    /// Tasks admitted regardless of load.
    pub const MIN_TOKENS: usize = 2;
    /// Admit more while the short-window average is under 80%...
    pub const SHORT_THRESHOLD: f64 = 0.80;
    /// ...or the long-window average is under 90%.
    pub const LONG_THRESHOLD: f64 = 0.90;
    /// Blocked acquires re-read the load this often.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(250);
}

/// CPU sampler sizing: 24 samples 5s apart, so the long window covers two minutes and the
/// short window ten seconds.
pub struct CpuMonitorConsts;

impl CpuMonitorConsts {
    pub const SNAPSHOTS: usize = 24;
    pub const INTERVAL: Duration = Duration::from_secs(5);
    pub const SHORT_WINDOW: usize = 2;
    pub const LONG_WINDOW: usize = 24;
}

// ---- Progress ----

/// Progress counter tuning.
pub struct ProgressConsts;

impl ProgressConsts {
    pub const UNIT: &'static str = " files";
    pub const DESC: &'static str = "Sweeping";
}
