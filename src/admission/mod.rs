//! Admission control: how many tasks may run at once.
//!
//! The dispatcher only ever calls [`TokenSource::acquire`] and [`TokenSource::release`]; it never
//! samples load itself. Swap implementations at construction time.

pub mod adaptive;
pub mod context;
pub mod cpu;
pub mod fixed;

pub use adaptive::{AdaptiveLimits, AdaptiveTokenSource};
pub use context::{CancelHandle, Context};
pub use cpu::{CpuLoad, CpuMonitor, LoadReport, LoadSignal};
pub use fixed::FixedTokenSource;

use crate::error::DispatchError;

/// Grants and takes back execution slots.
pub trait TokenSource: Send + Sync {
    /// Block until a slot is free or `ctx` is done. Never returns `Ok` without a slot.
    fn acquire(&self, ctx: &Context) -> Result<(), DispatchError>;

    /// Return one slot. Call exactly once per successful `acquire`. Never blocks.
    fn release(&self);
}

impl<T: TokenSource + ?Sized> TokenSource for std::sync::Arc<T> {
    fn acquire(&self, ctx: &Context) -> Result<(), DispatchError> {
        (**self).acquire(ctx)
    }

    fn release(&self) {
        (**self).release()
    }
}
