//! CPU utilization sampling for adaptive admission.
//!
//! A [`CpuMonitor`] is an ordinary value with a start/stop lifecycle: it owns one sampling thread
//! and hands out cheap [`CpuLoad`] handles. Nothing here is process-global.

use anyhow::{Context as _, Result, ensure};
use crossbeam_channel::{Receiver, Sender, bounded, select};
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::System;

/// Average busy fraction (0.0 - 1.0) over a short and a long window of samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadReport {
    pub short: f64,
    pub long: f64,
}

/// Source of utilization figures for admission decisions.
pub trait LoadSignal: Send + Sync {
    /// `None` while no samples are available.
    fn load(&self) -> Option<LoadReport>;
}

impl<F> LoadSignal for F
where
    F: Fn() -> Option<LoadReport> + Send + Sync,
{
    fn load(&self) -> Option<LoadReport> {
        self()
    }
}

/// Ring of the most recent utilization samples.
#[derive(Debug)]
pub struct Samples {
    ring: VecDeque<f64>,
    capacity: usize,
}

impl Samples {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, busy: f64) {
        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(busy.clamp(0.0, 1.0));
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Mean of the newest `window` samples (fewer if fewer were taken).
    fn mean_of_last(&self, window: usize) -> Option<f64> {
        let n = window.max(1).min(self.ring.len());
        if n == 0 {
            return None;
        }
        let sum: f64 = self.ring.iter().rev().take(n).sum();
        Some(sum / n as f64)
    }

    pub fn report(&self, short_window: usize, long_window: usize) -> Option<LoadReport> {
        Some(LoadReport {
            short: self.mean_of_last(short_window)?,
            long: self.mean_of_last(long_window)?,
        })
    }
}

/// Shareable read side of a [`CpuMonitor`].
#[derive(Clone)]
pub struct CpuLoad {
    samples: Arc<Mutex<Samples>>,
    short_window: usize,
    long_window: usize,
}

impl LoadSignal for CpuLoad {
    fn load(&self) -> Option<LoadReport> {
        let samples = self.samples.lock().ok()?;
        samples.report(self.short_window, self.long_window)
    }
}

pub struct CpuMonitor {
    load: CpuLoad,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CpuMonitor {
    /// Start sampling whole-machine CPU usage every `interval`, keeping `snapshots` samples.
    /// Reports average the newest `short_window` and `long_window` samples.
    pub fn start(
        snapshots: usize,
        interval: Duration,
        short_window: usize,
        long_window: usize,
    ) -> Result<Self> {
        ensure!(snapshots > 2, "cpu monitor needs more than 2 snapshots");
        ensure!(!interval.is_zero(), "cpu monitor interval must be positive");
        ensure!(
            short_window <= snapshots && long_window <= snapshots,
            "cpu monitor windows must fit in {snapshots} snapshots"
        );

        let samples = Arc::new(Mutex::new(Samples::new(snapshots)));
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let thread_samples = Arc::clone(&samples);
        let handle = thread::Builder::new()
            .name("tasksweep-cpu".to_string())
            .spawn(move || sample_loop(thread_samples, stop_rx, interval))
            .context("spawn cpu monitor thread")?;

        Ok(Self {
            load: CpuLoad {
                samples,
                short_window,
                long_window,
            },
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn load(&self) -> CpuLoad {
        self.load.clone()
    }

    /// Stop sampling and join the thread. Handles keep reporting the last samples taken.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects stop_rx, which ends the loop.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CpuMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sample_loop(samples: Arc<Mutex<Samples>>, stop_rx: Receiver<()>, interval: Duration) {
    let mut sys = System::new();
    // First refresh only primes the counters; usage is relative to the previous refresh.
    sys.refresh_cpu_usage();
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            default(interval) => {
                sys.refresh_cpu_usage();
                let busy = f64::from(sys.global_cpu_usage()) / 100.0;
                trace!("cpu busy {:.3}", busy);
                match samples.lock() {
                    Ok(mut s) => s.push(busy),
                    Err(_) => break,
                }
            }
        }
    }
    debug!("cpu monitor stopped");
}
