//! Per-task execution threads.

use anyhow::anyhow;
use crossbeam_channel::Sender;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::TaskRecord;
use crate::error::DispatchError;
use crate::runner::Runner;
use crate::utils::config::WORKER_THREAD_NAME;

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run once, turning a panic into a failed attempt.
fn run_guarded(runner: &dyn Runner, task: &TaskRecord) -> anyhow::Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| runner.run(task))) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("runner panicked: {}", panic_message(&*payload))),
    }
}

/// Start `task` on its own thread. Exactly one record is sent on `done_tx` per call, even when
/// the thread cannot be created.
pub(crate) fn spawn_worker(
    runner: Arc<dyn Runner>,
    task: TaskRecord,
    done_tx: &Sender<TaskRecord>,
) {
    let tx = done_tx.clone();
    let fallback = task.clone();
    let spawned = thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            let mut task = task;
            let result = run_guarded(runner.as_ref(), &task);
            task.record_attempt(result);
            let _ = tx.send(task);
        });
    if let Err(err) = spawned {
        let mut task = fallback;
        task.record_attempt(Err(DispatchError::Spawn(err).into()));
        let _ = done_tx.send(task);
    }
}
