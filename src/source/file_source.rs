//! Pending-work backlog for one prefix: discovery, dedup, retry re-queueing.

use log::debug;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::ObjectLister;
use crate::TaskRecord;
use crate::error::DispatchError;
use crate::utils::config::CLOCK_SKEW;

/// Queue state. Only touched while holding [`FileSource::state`].
struct QueueState {
    /// FIFO: discovery order first, retries appended at the back.
    pending: VecDeque<TaskRecord>,
    /// Every path ever discovered. Insert-only.
    dispatched: HashSet<String>,
    /// Lower bound on modification time for the next list call.
    checkpoint: SystemTime,
}

/// Reads, caches and refreshes the list of files under one prefix.
pub struct FileSource {
    lister: Arc<dyn ObjectLister>,
    prefix: String,
    clock_skew: Duration,
    state: Mutex<QueueState>,
}

impl FileSource {
    pub fn new(lister: Arc<dyn ObjectLister>, prefix: impl Into<String>) -> Self {
        Self::with_clock_skew(lister, prefix, CLOCK_SKEW)
    }

    /// `clock_skew` is subtracted from the local time recorded as the next checkpoint, to
    /// tolerate the store's clock running behind ours.
    pub fn with_clock_skew(
        lister: Arc<dyn ObjectLister>,
        prefix: impl Into<String>,
        clock_skew: Duration,
    ) -> Self {
        Self {
            lister,
            prefix: prefix.into(),
            clock_skew,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                dispatched: HashSet::new(),
                checkpoint: UNIX_EPOCH,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Put a task on the end of the pending queue.
    pub fn add_pending(&self, task: TaskRecord) {
        debug!("requeue {}", task);
        self.lock().pending.push_back(task);
    }

    /// List the prefix if nothing is pending, queueing every file not seen before.
    /// Returns how many were added. On error nothing changes.
    pub fn refill(&self) -> Result<usize, DispatchError> {
        self.refill_at(SystemTime::now())
    }

    /// [`refill`](Self::refill) with an explicit "now" for the checkpoint.
    pub fn refill_at(&self, now: SystemTime) -> Result<usize, DispatchError> {
        let since = {
            let state = self.lock();
            if !state.pending.is_empty() {
                return Ok(0);
            }
            state.checkpoint
        };

        // Captured before listing so objects landing during the call are not skipped next time.
        let update_time = now.checked_sub(self.clock_skew).unwrap_or(UNIX_EPOCH);
        let listing = self
            .lister
            .list(&self.prefix, since)
            .map_err(|source| DispatchError::Discovery {
                prefix: self.prefix.clone(),
                source,
            })?;

        let mut state = self.lock();
        state.checkpoint = state.checkpoint.max(update_time);
        let mut added = 0;
        for object in listing.objects {
            if object.is_prefix {
                debug!("Skipping subdirectory: {}", object.path);
                continue;
            }
            if state.dispatched.insert(object.path.clone()) {
                debug!("Adding {}", object.path);
                state.pending.push_back(TaskRecord::new(object.path));
                added += 1;
            }
        }
        Ok(added)
    }

    /// Pop the oldest pending task, listing first if the queue is empty.
    /// `Ok(None)` means nothing is pending even after listing.
    pub fn next(&self) -> Result<Option<TaskRecord>, DispatchError> {
        self.refill()?;
        Ok(self.lock().pending.pop_front())
    }

    pub fn has_pending(&self) -> bool {
        !self.lock().pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Paths currently waiting, front first.
    pub fn pending_paths(&self) -> Vec<String> {
        self.lock().pending.iter().map(|t| t.path.clone()).collect()
    }

    pub fn dispatched_len(&self) -> usize {
        self.lock().dispatched.len()
    }

    pub fn is_dispatched(&self, path: &str) -> bool {
        self.lock().dispatched.contains(path)
    }

    pub fn checkpoint(&self) -> SystemTime {
        self.lock().checkpoint
    }
}
