//! The per-task worker capability.

pub mod command;

pub use command::CommandRunner;

use crate::TaskRecord;

/// Processes one task. Side effects (parsing, storing) are entirely the runner's business;
/// the dispatcher only looks at success or failure.
pub trait Runner: Send + Sync {
    fn run(&self, task: &TaskRecord) -> anyhow::Result<()>;
}

impl<F> Runner for F
where
    F: Fn(&TaskRecord) -> anyhow::Result<()> + Send + Sync,
{
    fn run(&self, task: &TaskRecord) -> anyhow::Result<()> {
        self(task)
    }
}
