use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tasksweep::admission::cpu::Samples;
use tasksweep::admission::{
    AdaptiveLimits, AdaptiveTokenSource, Context, FixedTokenSource, LoadReport, LoadSignal,
    TokenSource,
};
use tasksweep::DispatchError;

fn short_timeout() -> Context {
    Context::background().with_timeout(Duration::from_millis(30))
}

// --- Context ---

#[test]
fn test_background_never_done() {
    let ctx = Context::background();
    assert!(ctx.err().is_none());
    assert!(ctx.deadline().is_none());
}

#[test]
fn test_cancel_reaches_derived_contexts() {
    let (ctx, cancel) = Context::with_cancel();
    let derived = ctx.with_timeout(Duration::from_secs(60));
    assert!(!derived.is_done());
    cancel.cancel();
    assert!(matches!(ctx.err(), Some(DispatchError::Cancelled)));
    assert!(matches!(derived.err(), Some(DispatchError::Cancelled)));
}

#[test]
fn test_earlier_deadline_wins() {
    let base = Instant::now() + Duration::from_secs(10);
    let ctx = Context::background().with_deadline(base);
    let later = ctx.with_deadline(base + Duration::from_secs(10));
    let earlier = ctx.with_deadline(base - Duration::from_secs(5));
    assert_eq!(later.deadline(), Some(base));
    assert_eq!(earlier.deadline(), Some(base - Duration::from_secs(5)));
}

#[test]
fn test_past_deadline_reports_exceeded() {
    let ctx = Context::background().with_deadline(Instant::now());
    assert!(matches!(ctx.err(), Some(DispatchError::DeadlineExceeded)));
    assert!(ctx.err().is_some_and(|e| e.is_context_done()));
}

// --- FixedTokenSource ---

#[test]
fn test_fixed_capacity_enforced() {
    let tokens = FixedTokenSource::new(2);
    let ctx = Context::background();
    tokens.acquire(&ctx).unwrap();
    tokens.acquire(&ctx).unwrap();
    assert_eq!(tokens.in_use(), 2);
    assert!(matches!(
        tokens.acquire(&short_timeout()),
        Err(DispatchError::DeadlineExceeded)
    ));
    tokens.release();
    assert_eq!(tokens.in_use(), 1);
    tokens.acquire(&ctx).unwrap();
}

#[test]
fn test_fixed_zero_capacity_clamped() {
    let tokens = FixedTokenSource::new(0);
    assert_eq!(tokens.capacity(), 1);
    tokens.acquire(&Context::background()).unwrap();
}

#[test]
fn test_fixed_surplus_release_ignored() {
    let tokens = FixedTokenSource::new(1);
    tokens.release();
    tokens.release();
    assert_eq!(tokens.in_use(), 0);
    assert_eq!(tokens.capacity(), 1);
}

#[test]
fn test_fixed_cancelled_context_wins_over_free_token() {
    let tokens = FixedTokenSource::new(4);
    let (ctx, cancel) = Context::with_cancel();
    cancel.cancel();
    assert!(matches!(tokens.acquire(&ctx), Err(DispatchError::Cancelled)));
    assert_eq!(tokens.in_use(), 0);
}

#[test]
fn test_fixed_blocked_acquire_woken_by_release() {
    let tokens = Arc::new(FixedTokenSource::new(1));
    tokens.acquire(&Context::background()).unwrap();
    let releaser = Arc::clone(&tokens);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        releaser.release();
    });
    let ctx = Context::background().with_timeout(Duration::from_secs(5));
    tokens.acquire(&ctx).unwrap();
    handle.join().unwrap();
}

#[test]
fn test_fixed_blocked_acquire_woken_by_cancel() {
    let tokens = Arc::new(FixedTokenSource::new(1));
    tokens.acquire(&Context::background()).unwrap();
    let (ctx, cancel) = Context::with_cancel();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
    });
    assert!(matches!(tokens.acquire(&ctx), Err(DispatchError::Cancelled)));
    handle.join().unwrap();
}

// --- AdaptiveTokenSource ---

fn limits(min: usize, max: usize) -> AdaptiveLimits {
    AdaptiveLimits {
        min_tokens: min,
        max_tokens: max,
        short_threshold: 0.8,
        long_threshold: 0.9,
        poll_interval: Duration::from_millis(5),
    }
}

fn fixed_load(short: f64, long: f64) -> Arc<dyn LoadSignal> {
    Arc::new(move || Some(LoadReport { short, long }))
}

fn acquire_all(tokens: &AdaptiveTokenSource) -> usize {
    let mut n = 0;
    while tokens.acquire(&short_timeout()).is_ok() {
        n += 1;
        if n > 64 {
            break;
        }
    }
    n
}

#[test]
fn test_adaptive_no_load_data_admits_min_only() {
    let no_data: Arc<dyn LoadSignal> = Arc::new(|| -> Option<LoadReport> { None });
    let tokens = AdaptiveTokenSource::new(limits(2, 4), no_data);
    assert_eq!(acquire_all(&tokens), 2);
}

#[test]
fn test_adaptive_headroom_admits_up_to_max() {
    let tokens = AdaptiveTokenSource::new(limits(1, 4), fixed_load(0.1, 0.1));
    assert_eq!(acquire_all(&tokens), 4);
    assert_eq!(tokens.in_use(), 4);
}

#[test]
fn test_adaptive_either_window_under_threshold_is_headroom() {
    let tokens = AdaptiveTokenSource::new(limits(1, 3), fixed_load(0.95, 0.5));
    assert_eq!(acquire_all(&tokens), 3);
    let tokens = AdaptiveTokenSource::new(limits(1, 3), fixed_load(0.5, 0.95));
    assert_eq!(acquire_all(&tokens), 3);
}

#[test]
fn test_adaptive_busy_cpu_holds_at_min() {
    let tokens = AdaptiveTokenSource::new(limits(2, 8), fixed_load(0.95, 0.95));
    assert_eq!(acquire_all(&tokens), 2);
    tokens.release();
    assert_eq!(tokens.in_use(), 1);
    tokens.acquire(&short_timeout()).unwrap();
}

#[test]
fn test_adaptive_limits_clamped() {
    let tokens = AdaptiveTokenSource::new(limits(10, 3), fixed_load(0.0, 0.0));
    assert_eq!(tokens.limits().min_tokens, 3);
    let tokens = AdaptiveTokenSource::new(limits(0, 0), fixed_load(0.0, 0.0));
    assert_eq!(tokens.limits().min_tokens, 1);
    assert_eq!(tokens.limits().max_tokens, 1);
}

#[test]
fn test_adaptive_release_wakes_waiter() {
    let tokens = Arc::new(AdaptiveTokenSource::new(
        limits(1, 1),
        fixed_load(0.0, 0.0),
    ));
    tokens.acquire(&Context::background()).unwrap();
    let releaser = Arc::clone(&tokens);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        releaser.release();
    });
    let ctx = Context::background().with_timeout(Duration::from_secs(5));
    tokens.acquire(&ctx).unwrap();
    handle.join().unwrap();
}

#[test]
fn test_adaptive_surplus_release_ignored() {
    let tokens = AdaptiveTokenSource::new(limits(1, 2), fixed_load(0.0, 0.0));
    tokens.release();
    assert_eq!(tokens.in_use(), 0);
}

// --- Samples ---

#[test]
fn test_samples_empty_has_no_report() {
    assert!(Samples::new(4).report(1, 4).is_none());
}

#[test]
fn test_samples_short_and_long_windows() {
    let mut samples = Samples::new(4);
    for busy in [1.0, 1.0, 0.0, 0.5] {
        samples.push(busy);
    }
    let report = samples.report(2, 4).unwrap();
    assert!((report.short - 0.25).abs() < 1e-9);
    assert!((report.long - 0.625).abs() < 1e-9);
}

#[test]
fn test_samples_ring_drops_oldest_and_clamps() {
    let mut samples = Samples::new(2);
    samples.push(5.0);
    samples.push(0.2);
    samples.push(0.4);
    assert_eq!(samples.len(), 2);
    let report = samples.report(1, 10).unwrap();
    assert!((report.short - 0.4).abs() < 1e-9);
    assert!((report.long - 0.3).abs() < 1e-9);

    let mut clamped = Samples::new(1);
    clamped.push(5.0);
    assert_eq!(clamped.report(1, 1).unwrap().short, 1.0);
}
