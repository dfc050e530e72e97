//! Fixed-size token pool, the weighted-semaphore flavour of [`TokenSource`].

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select};
use log::warn;

use super::{Context, TokenSource};
use crate::error::DispatchError;

/// A bounded channel pre-filled with `capacity` tokens. Acquire takes one out, release puts one back.
pub struct FixedTokenSource {
    capacity: usize,
    tokens_tx: Sender<()>,
    tokens_rx: Receiver<()>,
}

impl FixedTokenSource {
    /// `capacity` is clamped to at least 1 so a dispatcher can always make progress.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tokens_tx, tokens_rx) = bounded::<()>(capacity);
        for _ in 0..capacity {
            // Cannot fail: the channel was sized for exactly this many.
            let _ = tokens_tx.try_send(());
        }
        Self {
            capacity,
            tokens_tx,
            tokens_rx,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens currently handed out.
    pub fn in_use(&self) -> usize {
        self.capacity - self.tokens_rx.len()
    }
}

impl TokenSource for FixedTokenSource {
    fn acquire(&self, ctx: &Context) -> Result<(), DispatchError> {
        // select! picks randomly among ready arms, so check the context first.
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let deadline = ctx.deadline_rx();
        select! {
            recv(self.tokens_rx) -> token => {
                // We hold a sender ourselves, so the channel cannot disconnect.
                token.map_err(|_| DispatchError::Cancelled)
            }
            recv(ctx.done()) -> _ => Err(DispatchError::Cancelled),
            recv(deadline) -> _ => Err(DispatchError::DeadlineExceeded),
        }
    }

    fn release(&self) {
        match self.tokens_tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                warn!("token released with none outstanding; ignoring");
            }
            Err(TrySendError::Disconnected(())) => {}
        }
    }
}
