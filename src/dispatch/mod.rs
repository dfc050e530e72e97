//! The dispatcher: admits tasks under a token budget, runs them, and routes each completion to
//! success, the back of the queue, or the terminal error list.
//!
//! Two long-lived threads per batch:
//! - launch loop: acquire token → take next task → record in flight → spawn worker. Never waits
//!   on a task's actual work.
//! - completion handler: drains the done channel, updates state, releases the token.
//!
//! The done channel is unbounded, so a finishing worker never blocks and no completion is lost.
//! The handler runs until every sender is gone (the launch loop's and one per worker), which is
//! exactly the moment no more tasks will start and every started one has been finalized. It then
//! signals the [`Termination`] handle.

pub mod termination;
mod worker;

pub use termination::Termination;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use crate::admission::{Context, TokenSource};
use crate::error::DispatchError;
use crate::runner::Runner;
use crate::source::FileSource;
use crate::utils::config::WAIT_POLL_INTERVAL;
use crate::{BatchSummary, TaskOutcome, TaskRecord};

/// Called from the completion handler for every finished attempt. Keep it fast or send to a channel.
pub type Observer = Box<dyn Fn(&TaskRecord, TaskOutcome) + Send + Sync>;

struct InFlight {
    started: Instant,
}

/// Guarded by [`Dispatcher::state`].
#[derive(Default)]
struct DispatchState {
    in_flight: HashMap<String, InFlight>,
    /// Append-only; entries are never retried.
    errors: Vec<TaskRecord>,
    summary: BatchSummary,
    /// Bumped per processed completion. The launch loop waits on it when the queue is dry.
    completions: u64,
}

pub struct Dispatcher {
    source: Arc<FileSource>,
    runner: Arc<dyn Runner>,
    retry_limit: usize,
    state: Mutex<DispatchState>,
    progress: Condvar,
    observer: Option<Observer>,
}

impl Dispatcher {
    /// `retry_limit` is the number of retries after a first failure; 0 makes the first failure terminal.
    pub fn new(source: Arc<FileSource>, runner: Arc<dyn Runner>, retry_limit: usize) -> Self {
        Self {
            source,
            runner,
            retry_limit,
            state: Mutex::new(DispatchState::default()),
            progress: Condvar::new(),
            observer: None,
        }
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&TaskRecord, TaskOutcome) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn source(&self) -> &Arc<FileSource> {
        &self.source
    }

    pub fn retry_limit(&self) -> usize {
        self.retry_limit
    }

    /// Tasks that exhausted their retries, in the order they gave up. Final once the batch's
    /// [`Termination`] is signaled.
    pub fn errors(&self) -> Vec<TaskRecord> {
        self.lock().errors.clone()
    }

    pub fn summary(&self) -> BatchSummary {
        self.lock().summary
    }

    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn in_flight_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().in_flight.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// `(in_flight, pending)` paths read under one lock, so a retry moving between the two is
    /// never seen in both.
    pub fn queue_snapshot(&self) -> (Vec<String>, Vec<String>) {
        let state = self.lock();
        let mut in_flight: Vec<String> = state.in_flight.keys().cloned().collect();
        in_flight.sort();
        (in_flight, self.source.pending_paths())
    }

    /// Start draining the source. Fails only if the first listing fails; later listing errors
    /// are logged and treated as "nothing new yet".
    ///
    /// Cancelling `ctx` stops admission but does not interrupt running tasks; wait on the
    /// returned handle before tearing anything down. Run one batch at a time per dispatcher.
    pub fn process_all(
        self: &Arc<Self>,
        ctx: &Context,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Termination, DispatchError> {
        let added = self.source.refill()?;
        info!("{}: {} new files", self.source.prefix(), added);

        let (done_tx, done_rx) = unbounded::<TaskRecord>();
        let (term_tx, term_rx) = bounded::<()>(0);

        let disp = Arc::clone(self);
        let handler_tokens = Arc::clone(&tokens);
        thread::Builder::new()
            .name("tasksweep-done".to_string())
            .spawn(move || {
                disp.handle_completions(done_rx, handler_tokens.as_ref());
                drop(term_tx);
            })?;

        // If this spawn fails the closure (and done_tx) is dropped, so the handler exits too.
        let disp = Arc::clone(self);
        let ctx = ctx.clone();
        thread::Builder::new()
            .name("tasksweep-launch".to_string())
            .spawn(move || disp.launch_loop(&ctx, tokens.as_ref(), done_tx))?;

        Ok(Termination::new(term_rx))
    }

    fn launch_loop(
        &self,
        ctx: &Context,
        tokens: &dyn TokenSource,
        done_tx: Sender<TaskRecord>,
    ) {
        loop {
            if let Err(err) = tokens.acquire(ctx) {
                info!("admission stopped: {}", err);
                break;
            }
            let Some(task) = self.next_task(ctx) else {
                tokens.release();
                info!("No more tasks");
                break;
            };
            debug!("starting {}", task);
            self.start_task(task, &done_tx);
        }
        // Dropping done_tx here; the handler finishes when the last worker drops its clone.
    }

    /// Next task to run, or `None` when nothing is pending, nothing is in flight, and listing
    /// turned up nothing new (or `ctx` ended while waiting).
    fn next_task(&self, ctx: &Context) -> Option<TaskRecord> {
        loop {
            if ctx.is_done() {
                return None;
            }
            match self.source.next() {
                Ok(Some(task)) => return Some(task),
                Ok(None) => {}
                Err(err) => warn!("{}", err),
            }
            if !self.wait_for_completion(ctx) {
                return None;
            }
        }
    }

    /// With tasks still in flight a failure may yet be re-queued, so wait for the next
    /// completion instead of giving up. Returns false when the batch is exhausted or `ctx` ended.
    fn wait_for_completion(&self, ctx: &Context) -> bool {
        let mut state = self.lock();
        // Re-queueing happens under this lock, so the two checks agree.
        if self.source.has_pending() {
            return !ctx.is_done();
        }
        if state.in_flight.is_empty() {
            return false;
        }
        debug!("queue empty, waiting on {} in flight", state.in_flight.len());
        let seen = state.completions;
        while state.completions == seen {
            if ctx.is_done() {
                return false;
            }
            state = self
                .progress
                .wait_timeout(state, WAIT_POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        !ctx.is_done()
    }

    fn start_task(&self, task: TaskRecord, done_tx: &Sender<TaskRecord>) {
        {
            let mut state = self.lock();
            let entry = InFlight {
                started: Instant::now(),
            };
            if state.in_flight.insert(task.path.clone(), entry).is_some() {
                error!("{} was already in flight", task.path);
            }
            state.summary.started += 1;
        }
        worker::spawn_worker(Arc::clone(&self.runner), task, done_tx);
    }

    fn handle_completions(&self, done_rx: Receiver<TaskRecord>, tokens: &dyn TokenSource) {
        for task in done_rx {
            debug!("received {}", task);
            if let Err(err) = self.update_state(task) {
                error!("{}", err);
            }
            tokens.release();
        }
        debug!("completion handler drained");
    }

    /// Record one finished attempt: drop it from in flight, then retry or give up on failure.
    /// Called by the completion handler; a record that is not in flight is rejected untouched.
    pub fn update_state(&self, mut task: TaskRecord) -> Result<TaskOutcome, DispatchError> {
        let mut state = self.lock();
        let Some(flight) = state.in_flight.remove(&task.path) else {
            return Err(DispatchError::TaskNotFound(task.path));
        };
        state.completions += 1;

        let outcome = if task.succeeded() {
            debug!("{} done in {:?}", task.path, flight.started.elapsed());
            state.summary.succeeded += 1;
            TaskOutcome::Succeeded
        } else {
            // Counts retries granted, so a terminal record carries `retry_limit`.
            if task.failures < self.retry_limit {
                task.failures += 1;
                state.summary.retried += 1;
                TaskOutcome::Retrying
            } else {
                state.summary.failed += 1;
                TaskOutcome::Failed
            }
        };

        let observed = self.observer.as_ref().map(|_| task.clone());
        match outcome {
            TaskOutcome::Succeeded => {}
            TaskOutcome::Retrying => self.source.add_pending(task),
            TaskOutcome::Failed => {
                warn!("giving up on {}", task);
                state.errors.push(task);
            }
        }
        drop(state);
        self.progress.notify_all();

        if let (Some(observer), Some(task)) = (&self.observer, observed) {
            observer(&task, outcome);
        }
        Ok(outcome)
    }
}
