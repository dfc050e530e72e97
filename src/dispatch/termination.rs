use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Signaled once a batch will start no more tasks and every started task has been finalized.
///
/// Nothing is ever sent on the channel: the completion handler drops the only sender when it is
/// finished, so every clone of the handle sees the disconnect. Signaling means the error list is
/// final and resources may be torn down; the handler thread itself may still be exiting.
#[derive(Clone)]
pub struct Termination {
    done: Receiver<()>,
}

impl Termination {
    pub(crate) fn new(done: Receiver<()>) -> Self {
        Self { done }
    }

    /// Block until signaled.
    pub fn wait(&self) {
        let _ = self.done.recv();
    }

    /// Block up to `timeout`. Returns true if signaled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.done.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    pub fn is_signaled(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready on signaling, for use in `select!`.
    pub fn as_receiver(&self) -> &Receiver<()> {
        &self.done
    }
}
