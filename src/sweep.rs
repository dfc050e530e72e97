//! Directory sweeping: the CLI's end-to-end run.

use anyhow::{Context as _, Result, bail};
use crossbeam_channel::select;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::admission::{
    AdaptiveLimits, AdaptiveTokenSource, Context, CpuMonitor, FixedTokenSource, TokenSource,
};
use crate::dispatch::Dispatcher;
use crate::engine::progress::{completion_observer, create_counter, refresh_bar};
use crate::runner::CommandRunner;
use crate::source::{FileSource, LocalLister};
use crate::utils::config::{
    AdaptiveDefaults, CpuMonitorConsts, ProgressConsts, WorkerThreadLimits,
};
use crate::{AdmissionMode, BatchSummary, DispatchError, SweepOpts, TaskRecord};

/// Outcome of [`sweep_dir`].
#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub dir: String,
    pub workers: usize,
    pub rounds: usize,
    /// Distinct files discovered over all rounds.
    pub discovered: usize,
    pub summary: BatchSummary,
    /// Files that never succeeded.
    pub errors: Vec<TaskRecord>,
    /// Stopped by Ctrl+C (not by timeout or running out of work).
    pub cancelled: bool,
}

/// Token source for `opts.admission`. In cpu mode the returned monitor must be kept alive for
/// the duration of the run; drop or stop it afterwards.
pub fn build_token_source(
    opts: &SweepOpts,
    workers: usize,
) -> Result<(Arc<dyn TokenSource>, Option<CpuMonitor>)> {
    match opts.admission {
        AdmissionMode::Fixed => Ok((Arc::new(FixedTokenSource::new(workers)), None)),
        AdmissionMode::Cpu => {
            let monitor = CpuMonitor::start(
                CpuMonitorConsts::SNAPSHOTS,
                CpuMonitorConsts::INTERVAL,
                CpuMonitorConsts::SHORT_WINDOW,
                CpuMonitorConsts::LONG_WINDOW,
            )?;
            let limits = AdaptiveLimits {
                min_tokens: opts.min_workers,
                max_tokens: workers,
                short_threshold: opts.short_threshold,
                long_threshold: opts.long_threshold,
                poll_interval: AdaptiveDefaults::POLL_INTERVAL,
            };
            let tokens = AdaptiveTokenSource::new(limits, Arc::new(monitor.load()));
            Ok((Arc::new(tokens), Some(monitor)))
        }
    }
}

/// Run `opts.command` on every file in `opts.dir` until the directory is drained (or, with
/// `opts.watch`, until Ctrl+C or the timeout).
pub fn sweep_dir(opts: &SweepOpts) -> Result<SweepReport> {
    let runner = CommandRunner::from_argv(&opts.command)?;
    let dir = opts
        .dir
        .canonicalize()
        .with_context(|| format!("resolve {}", opts.dir.display()))?;
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let prefix = dir.to_string_lossy().into_owned();

    let workers = opts
        .workers
        .unwrap_or_else(|| WorkerThreadLimits::current().default_workers())
        .max(1);
    let (tokens, monitor) = build_token_source(opts, workers)?;
    info!(
        "sweeping {} with {} ({:?} admission, {} retries)",
        prefix,
        runner.program(),
        opts.admission,
        opts.retry_limit
    );

    let source = Arc::new(FileSource::new(Arc::new(LocalLister::new()), prefix.clone()));
    let mut dispatcher = Dispatcher::new(Arc::clone(&source), Arc::new(runner), opts.retry_limit);
    if opts.verbose {
        let bar = create_counter(ProgressConsts::DESC);
        refresh_bar(&bar);
        dispatcher = dispatcher.with_observer(completion_observer(&bar));
    }
    let dispatcher = Arc::new(dispatcher);

    let (ctx, cancel) = Context::with_cancel();
    // Fails if a handler is already installed (second sweep in one process).
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        warn!("Ctrl+C handler not installed: {}", e);
    }
    let ctx = match opts.timeout {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    };

    let mut rounds = 0;
    loop {
        rounds += 1;
        match dispatcher.process_all(&ctx, Arc::clone(&tokens)) {
            Ok(termination) => termination.wait(),
            // Only the first listing is fatal; in watch mode the next round lists again.
            Err(err) if rounds > 1 => warn!("{}", err),
            Err(err) => return Err(err).context("initial listing"),
        }
        let Some(interval) = opts.watch else {
            break;
        };
        if ctx.is_done() {
            break;
        }
        let deadline = ctx.deadline_rx();
        select! {
            recv(ctx.done()) -> _ => break,
            recv(deadline) -> _ => break,
            default(interval) => {}
        }
    }

    if let Some(monitor) = monitor {
        monitor.stop();
    }

    Ok(SweepReport {
        dir: prefix,
        workers,
        rounds,
        discovered: source.dispatched_len(),
        summary: dispatcher.summary(),
        errors: dispatcher.errors(),
        cancelled: matches!(ctx.err(), Some(DispatchError::Cancelled)),
    })
}

/// Print the report: JSON to stdout, or a line per failed file to stderr.
pub fn print_report(report: &SweepReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for task in &report.errors {
        eprintln!("{}", task);
    }
    let s = &report.summary;
    eprintln!(
        "{} started, {} succeeded, {} retried, {} failed ({} rounds)",
        s.started, s.succeeded, s.retried, s.failed, report.rounds
    );
    Ok(())
}
