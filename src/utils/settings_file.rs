//! Load `.tasksweep.toml` from the swept directory (CLI only). Lib callers build their own
//! dispatcher and never read this file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::utils::config::PackagePaths;
use crate::{AdmissionMode, SweepOpts};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsSection {
    command: Option<Vec<String>>,
    workers: Option<usize>,
    retries: Option<usize>,
    admission: Option<AdmissionMode>,
    min_workers: Option<usize>,
    short_threshold: Option<f64>,
    long_threshold: Option<f64>,
    /// Seconds.
    timeout: Option<u64>,
    /// Seconds.
    watch: Option<u64>,
    json: Option<bool>,
    verbose: Option<bool>,
}

pub fn parse_settings(s: &str) -> Result<SettingsFile> {
    toml::from_str(s).context("parse settings")
}

/// Load the settings file from `dir`. `Ok(None)` if there is none. Runs before logging is set
/// up, so the caller reports errors.
pub fn load_settings_file(dir: &Path) -> Result<Option<SettingsFile>> {
    let path = dir.join(PackagePaths::get().settings_filename());
    if !path.is_file() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    parse_settings(&s)
        .with_context(|| path.display().to_string())
        .map(Some)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident => $opts_field:ident) => {
        if let Some(v) = $section.$field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file settings to opts (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_opts(file: &SettingsFile, opts: &mut SweepOpts) {
    let section = &file.settings;
    if let Some(ref command) = section.command {
        opts.command = command.clone();
    }
    if let Some(workers) = section.workers {
        opts.workers = Some(workers);
    }
    apply_file_opt!(section, opts, retries => retry_limit);
    apply_file_opt!(section, opts, admission => admission);
    apply_file_opt!(section, opts, min_workers => min_workers);
    apply_file_opt!(section, opts, short_threshold => short_threshold);
    apply_file_opt!(section, opts, long_threshold => long_threshold);
    if let Some(secs) = section.timeout {
        opts.timeout = Some(Duration::from_secs(secs));
    }
    if let Some(secs) = section.watch {
        opts.watch = Some(Duration::from_secs(secs));
    }
    apply_file_opt!(section, opts, json => json);
    apply_file_opt!(section, opts, verbose => verbose);
}
