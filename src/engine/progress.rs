//! Progress counter for completed tasks.

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

use crate::TaskOutcome;
use crate::utils::config::ProgressConsts;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Counter for an unknown total (files keep arriving): shows count without percentage.
pub fn create_counter(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = ProgressConsts::UNIT
    )))
}

/// Force a refresh of the bar (e.g. so the counter shows "0 files" immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Update the bar by `n`. Uses try_lock: if contended the update is skipped rather than
/// stalling the completion handler.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Observer for [`Dispatcher::with_observer`](crate::dispatch::Dispatcher::with_observer): counts
/// files that reached a final outcome. Retries are not counted.
pub fn completion_observer(
    bar: &ProgressBar,
) -> impl Fn(&crate::TaskRecord, TaskOutcome) + Send + Sync + 'static {
    let bar = Arc::clone(bar);
    move |_task, outcome| {
        if outcome != TaskOutcome::Retrying {
            update_progress_bar(&bar, 1);
        }
    }
}
