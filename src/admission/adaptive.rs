//! Utilization-driven token source.

use crossbeam_channel::{Receiver, Sender, bounded, select};
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Context, LoadSignal, TokenSource};
use crate::error::DispatchError;

#[derive(Clone, Copy, Debug)]
pub struct AdaptiveLimits {
    /// Always admitted, whatever the load.
    pub min_tokens: usize,
    /// Never exceeded.
    pub max_tokens: usize,
    /// Admit above the floor when the short-window average is under this.
    pub short_threshold: f64,
    /// ...or when the long-window average is under this.
    pub long_threshold: f64,
    /// How often a blocked acquire re-reads the load.
    pub poll_interval: Duration,
}

/// Admits up to `min_tokens` unconditionally, and up to `max_tokens` while the CPU has headroom.
pub struct AdaptiveTokenSource {
    limits: AdaptiveLimits,
    signal: Arc<dyn LoadSignal>,
    in_use: Mutex<usize>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl AdaptiveTokenSource {
    pub fn new(limits: AdaptiveLimits, signal: Arc<dyn LoadSignal>) -> Self {
        let max_tokens = limits.max_tokens.max(1);
        let limits = AdaptiveLimits {
            max_tokens,
            min_tokens: limits.min_tokens.clamp(1, max_tokens),
            ..limits
        };
        let (wake_tx, wake_rx) = bounded::<()>(max_tokens);
        Self {
            limits,
            signal,
            in_use: Mutex::new(0),
            wake_tx,
            wake_rx,
        }
    }

    pub fn limits(&self) -> AdaptiveLimits {
        self.limits
    }

    pub fn in_use(&self) -> usize {
        self.in_use.lock().map(|n| *n).unwrap_or(0)
    }

    fn has_headroom(&self) -> bool {
        match self.signal.load() {
            Some(report) => {
                report.short < self.limits.short_threshold
                    || report.long < self.limits.long_threshold
            }
            None => false,
        }
    }

    fn try_admit(&self) -> bool {
        let Ok(mut in_use) = self.in_use.lock() else {
            return false;
        };
        let admit = *in_use < self.limits.min_tokens
            || (*in_use < self.limits.max_tokens && self.has_headroom());
        if admit {
            *in_use += 1;
            debug!("admitted token ({} in use)", *in_use);
        }
        admit
    }
}

impl TokenSource for AdaptiveTokenSource {
    fn acquire(&self, ctx: &Context) -> Result<(), DispatchError> {
        let deadline = ctx.deadline_rx();
        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }
            if self.try_admit() {
                return Ok(());
            }
            select! {
                recv(self.wake_rx) -> _ => {}
                recv(ctx.done()) -> _ => return Err(DispatchError::Cancelled),
                recv(deadline) -> _ => return Err(DispatchError::DeadlineExceeded),
                default(self.limits.poll_interval) => {}
            }
        }
    }

    fn release(&self) {
        if let Ok(mut in_use) = self.in_use.lock() {
            if *in_use == 0 {
                warn!("token released with none outstanding; ignoring");
                return;
            }
            *in_use -= 1;
        }
        // Full means waiters already have pending wakeups.
        let _ = self.wake_tx.try_send(());
    }
}
