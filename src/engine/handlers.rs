//! Command handler for the sweep run

use anyhow::{Result, bail};
use std::time::Duration;

use crate::SweepOpts;
use crate::engine::Cli;
use crate::sweep::{print_report, sweep_dir};
use crate::utils::config::PackagePaths;
use crate::utils::{
    SettingsFile, apply_file_to_opts, load_dotenv, load_settings_file, setup_logging,
};

/// Build opts: defaults, then the settings file (if any), then CLI flags.
pub fn build_opts(cli: &Cli, file: Option<&SettingsFile>) -> SweepOpts {
    let mut opts = SweepOpts {
        dir: cli.dir.clone(),
        ..Default::default()
    };
    if let Some(file) = file {
        apply_file_to_opts(file, &mut opts);
    }
    if !cli.command.is_empty() {
        opts.command = cli.command.clone();
    }
    if cli.workers.is_some() {
        opts.workers = cli.workers;
    }
    if let Some(retries) = cli.retries {
        opts.retry_limit = retries;
    }
    if let Some(admission) = cli.admission {
        opts.admission = admission;
    }
    if let Some(min) = cli.min_workers {
        opts.min_workers = min;
    }
    if let Some(secs) = cli.timeout {
        opts.timeout = Some(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.watch {
        opts.watch = Some(Duration::from_secs(secs));
    }
    if let Some(json) = cli.json {
        opts.json = json;
    }
    if let Some(verbose) = cli.verbose {
        opts.verbose = verbose;
    }
    opts
}

/// Handle the sweep: load .env and settings, set up logging, run, report.
pub fn handle_run(cli: &Cli) -> Result<()> {
    load_dotenv(&cli.dir);
    let (file, file_err) = match load_settings_file(&cli.dir) {
        Ok(file) => (file, None),
        Err(e) => (None, Some(e)),
    };
    let opts = build_opts(cli, file.as_ref());
    setup_logging(opts.verbose);
    if let Some(e) = file_err {
        log::warn!("Ignoring settings file: {:#}", e);
    }
    log::debug!(
        "{} CONFIG:{:#?}",
        PackagePaths::get().pkg_name().to_uppercase(),
        opts
    );

    let report = sweep_dir(&opts)?;
    print_report(&report, opts.json)?;
    if report.cancelled {
        bail!("interrupted");
    }
    if !report.errors.is_empty() {
        bail!("{} file(s) failed", report.errors.len());
    }
    Ok(())
}
