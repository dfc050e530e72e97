//! Cancellation and deadline context passed into admission.
//!
//! The done signal is a channel disconnect: every clone of the receiver observes it at once, and
//! it composes with token channels in a single `select!`.

use crossbeam_channel::{Receiver, Sender, TryRecvError, at, bounded, never};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::DispatchError;

/// Shared trigger: dropping the only sender disconnects every `done` receiver.
type Trigger = Arc<Mutex<Option<Sender<()>>>>;

#[derive(Clone)]
pub struct Context {
    done: Receiver<()>,
    trigger: Option<Trigger>,
    deadline: Option<Instant>,
}

/// Cancels the [`Context`] it was created with, and every context derived from it.
#[derive(Clone)]
pub struct CancelHandle {
    trigger: Trigger,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if let Ok(mut guard) = self.trigger.lock() {
            guard.take();
        }
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            done: never(),
            trigger: None,
            deadline: None,
        }
    }

    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = bounded::<()>(0);
        let trigger: Trigger = Arc::new(Mutex::new(Some(tx)));
        let ctx = Self {
            done: rx,
            trigger: Some(Arc::clone(&trigger)),
            deadline: None,
        };
        (ctx, CancelHandle { trigger })
    }

    /// Derived context sharing this one's cancellation, expiring after `timeout` at the latest.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derived context sharing this one's cancellation; the earlier of the two deadlines wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(d) => d.min(deadline),
            None => deadline,
        };
        Self {
            done: self.done.clone(),
            trigger: self.trigger.clone(),
            deadline: Some(deadline),
        }
    }

    /// Receiver that becomes ready (disconnected) on cancellation.
    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Receiver that fires at the deadline, or never.
    pub fn deadline_rx(&self) -> Receiver<Instant> {
        match self.deadline {
            Some(d) => at(d),
            None => never(),
        }
    }

    /// `Some` once the context is cancelled or past its deadline. Cancellation wins when both hold.
    pub fn err(&self) -> Option<DispatchError> {
        if matches!(self.done.try_recv(), Err(TryRecvError::Disconnected)) {
            return Some(DispatchError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(DispatchError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
