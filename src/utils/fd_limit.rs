//! File descriptor limit detection for capping concurrent tasks (Unix).

/// Estimated file descriptors held per running task (child process pipes, the file itself).
pub const FDS_PER_WORKER: usize = 4;

/// Fraction of the process FD limit to use (leave headroom for listing and logging).
const FD_LIMIT_FRACTION: f64 = 0.8;

/// Returns the soft limit for max open file descriptors, or `None` if unavailable (e.g. Windows).
#[cfg(unix)]
pub fn max_open_fds() -> Option<u64> {
    use std::mem::MaybeUninit;
    let mut rlim = MaybeUninit::<libc::rlimit>::uninit();
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, rlim.as_mut_ptr()) } != 0 {
        return None;
    }
    let rlim = unsafe { rlim.assume_init() };
    let cur = rlim.rlim_cur;
    // RLIM_INFINITY is typically !0 or u64::MAX; treat as "no practical limit"
    if cur == libc::RLIM_INFINITY || cur > i64::MAX as u64 {
        return None;
    }
    Some(cur)
}

#[cfg(not(unix))]
pub fn max_open_fds() -> Option<u64> {
    None
}

/// Workers that fit in ~80% of `limit` descriptors at `fds_per_worker` each. At least 1.
pub fn workers_for_fd_limit(limit: u64, fds_per_worker: usize) -> usize {
    let usable = (limit as f64 * FD_LIMIT_FRACTION) as usize;
    (usable / fds_per_worker.max(1)).max(1)
}

/// Largest worker count for this process's FD soft limit.
/// Returns `None` if no limit is available (use caller's default).
pub fn max_workers_by_fd_limit() -> Option<usize> {
    max_open_fds().map(|limit| workers_for_fd_limit(limit, FDS_PER_WORKER))
}
