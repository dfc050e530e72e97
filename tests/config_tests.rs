use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tasksweep::engine::{Cli, build_opts};
use tasksweep::utils::{apply_file_to_opts, parse_settings, workers_for_fd_limit};
use tasksweep::{AdmissionMode, SweepOpts};

// --- workers_for_fd_limit ---

#[test]
fn test_workers_for_fd_limit_uses_80_percent() {
    assert_eq!(workers_for_fd_limit(1000, 4), 200);
}

#[test]
fn test_workers_for_fd_limit_at_least_one() {
    assert_eq!(workers_for_fd_limit(2, 4), 1);
    assert_eq!(workers_for_fd_limit(0, 4), 1);
}

#[test]
fn test_workers_for_fd_limit_zero_per_worker() {
    assert_eq!(workers_for_fd_limit(10, 0), 8);
}

// --- settings file ---

#[test]
fn test_parse_settings_and_apply() {
    let file = parse_settings(
        r#"
        [settings]
        command = ["gzip", "-k"]
        workers = 3
        retries = 4
        admission = "cpu"
        timeout = 90
        json = true
        "#,
    )
    .unwrap();
    let mut opts = SweepOpts::default();
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.command, vec!["gzip", "-k"]);
    assert_eq!(opts.workers, Some(3));
    assert_eq!(opts.retry_limit, 4);
    assert_eq!(opts.admission, AdmissionMode::Cpu);
    assert_eq!(opts.timeout, Some(Duration::from_secs(90)));
    assert!(opts.json);
    assert!(!opts.verbose);
    assert_eq!(opts.watch, None);
}

#[test]
fn test_parse_settings_empty_keeps_defaults() {
    let file = parse_settings("").unwrap();
    let mut opts = SweepOpts::default();
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.retry_limit, SweepOpts::default().retry_limit);
    assert!(opts.command.is_empty());
}

#[test]
fn test_parse_settings_rejects_unknown_keys() {
    assert!(parse_settings("[settings]\nthreads = 4\n").is_err());
    assert!(parse_settings("[other]\n").is_err());
}

#[test]
fn test_parse_settings_rejects_bad_admission() {
    assert!(parse_settings("[settings]\nadmission = \"turbo\"\n").is_err());
}

// --- CLI over settings ---

#[test]
fn test_cli_overrides_settings_file() {
    let file = parse_settings(
        r#"
        [settings]
        command = ["false"]
        retries = 4
        workers = 3
        "#,
    )
    .unwrap();
    let cli = Cli::parse_from(["tasksweep", "data", "-r", "0", "--", "echo", "hi"]);
    let opts = build_opts(&cli, Some(&file));
    assert_eq!(opts.dir, PathBuf::from("data"));
    assert_eq!(opts.command, vec!["echo", "hi"]);
    assert_eq!(opts.retry_limit, 0);
    assert_eq!(opts.workers, Some(3));
}

#[test]
fn test_cli_defaults() {
    let cli = Cli::parse_from(["tasksweep"]);
    let opts = build_opts(&cli, None);
    assert_eq!(opts.dir, PathBuf::from("."));
    assert!(opts.command.is_empty());
    assert_eq!(opts.admission, AdmissionMode::Fixed);
    assert_eq!(opts.timeout, None);
}

#[test]
fn test_cli_flags() {
    let cli = Cli::parse_from([
        "tasksweep", "in", "-w", "8", "-a", "cpu", "--min-workers", "2", "-t", "30", "--watch",
        "5", "--json", "-v", "--", "cat",
    ]);
    let opts = build_opts(&cli, None);
    assert_eq!(opts.workers, Some(8));
    assert_eq!(opts.admission, AdmissionMode::Cpu);
    assert_eq!(opts.min_workers, 2);
    assert_eq!(opts.timeout, Some(Duration::from_secs(30)));
    assert_eq!(opts.watch, Some(Duration::from_secs(5)));
    assert!(opts.json);
    assert!(opts.verbose);
    assert_eq!(opts.command, vec!["cat"]);
}
