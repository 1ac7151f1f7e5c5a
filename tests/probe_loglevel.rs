//! Probe stacking: `prefix("foo")` wraps `loglevel("^foo\\." -> DEBUG)`
//! wraps `stdio(NOTICE)`. Checks that the prefix rewrites the pipe name
//! before the loglevel rule matches against it, that the rule only
//! drops events below its own threshold (it never raises a downstream
//! probe's own gate), and that an unmatched pipe name passes the
//! loglevel stage untouched.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use upipe_core::error::UError;
use upipe_core::uprobe::loglevel::LoglevelProbe;
use upipe_core::uprobe::prefix::PrefixProbe;
use upipe_core::uprobe::stdio::StdioProbe;
use upipe_core::uprobe::{LogLevel, Uprobe, UprobeEvent};

struct CountingProbe(AtomicUsize);
impl Uprobe for CountingProbe {
    fn throw(&self, _pipe_name: &str, _event: &UprobeEvent) -> Result<(), UError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn log(level: LogLevel) -> UprobeEvent {
    UprobeEvent::Log { level, message: "x264 frame encoded".into() }
}

fn stack(prefix: &str, downstream: Arc<dyn Uprobe>) -> PrefixProbe {
    let loglevel = LoglevelProbe::new(downstream).with_rule(r"^foo\.", LogLevel::Debug).unwrap();
    PrefixProbe::new(prefix, Arc::new(loglevel))
}

#[test]
fn matched_prefix_lets_debug_through_the_loglevel_gate_but_stdio_still_filters_it() {
    let probe = stack("foo", Arc::new(StdioProbe::new(LogLevel::Notice)));
    // Debug >= the rule's Debug threshold, so loglevel forwards it; but
    // stdio's own Notice threshold still rejects it downstream.
    let err = probe.throw("x264", &log(LogLevel::Debug)).unwrap_err();
    assert!(matches!(err, UError::Unhandled));
}

#[test]
fn matched_prefix_warning_clears_both_gates() {
    let probe = stack("foo", Arc::new(StdioProbe::new(LogLevel::Notice)));
    probe.throw("x264", &log(LogLevel::Warning)).unwrap();
}

#[test]
fn below_rule_threshold_is_dropped_before_reaching_the_next_probe() {
    let counter = Arc::new(CountingProbe(AtomicUsize::new(0)));
    // Verbose < the rule's Debug threshold: dropped at the loglevel
    // stage itself, never forwarded, regardless of what's downstream.
    let probe = stack("foo", counter.clone());
    probe.throw("x264", &log(LogLevel::Verbose)).unwrap();
    assert_eq!(counter.0.load(Ordering::SeqCst), 0);
}

#[test]
fn unmatched_prefix_bypasses_the_rule_entirely() {
    let counter = Arc::new(CountingProbe(AtomicUsize::new(0)));
    // "bar.x264" never matches "^foo\.", so the loglevel stage forwards
    // every level untouched, including Verbose.
    let probe = stack("bar", counter.clone());
    probe.throw("x264", &log(LogLevel::Verbose)).unwrap();
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
}

#[test]
fn unmatched_prefix_still_suppressed_by_stdios_own_threshold() {
    let probe = stack("bar", Arc::new(StdioProbe::new(LogLevel::Notice)));
    let err = probe.throw("x264", &log(LogLevel::Debug)).unwrap_err();
    assert!(matches!(err, UError::Unhandled));
}
