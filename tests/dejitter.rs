//! A source whose arrivals jitter by a few milliseconds around a
//! fixed latency should converge toward a steady smoothed offset, and
//! the very first observation establishes the baseline rather than
//! being smoothed against anything (there's nothing to smooth against
//! yet).

use std::sync::Arc;

use parking_lot::Mutex;

use upipe_core::uclock::{TestClock, Uclock};
use upipe_core::uprobe::dejitter::DejitterProbe;
use upipe_core::uprobe::{throw_clock_ref, throw_clock_ts, Uprobe};
use upipe_core::uref::Uref;

#[test]
fn first_observation_seeds_the_offset_unsmoothed() {
    let probe = DejitterProbe::new(8);
    let clock = TestClock::new(1 << 32);
    clock.advance(1000);
    let cr_prog = clock.now();
    let cr_sys = cr_prog + 500;
    assert_eq!(probe.smooth(cr_sys, cr_prog), cr_sys);
}

#[test]
fn jittery_arrivals_converge_on_the_true_latency() {
    let probe = DejitterProbe::new(8);
    let clock = TestClock::new(0);
    let mut smoothed_cr_sys = 0u64;

    for i in 0..300u64 {
        clock.advance(2700); // 100us per tick at 27MHz
        let cr_prog = clock.now();
        let jitter: i64 = match i % 3 {
            0 => 30,
            1 => -30,
            _ => 0,
        };
        let cr_sys = (cr_prog as i64 + 4000 + jitter) as u64;
        smoothed_cr_sys = probe.smooth(cr_sys, cr_prog);
    }

    let final_cr_prog = clock.now();
    let offset = smoothed_cr_sys as i64 - final_cr_prog as i64;
    assert!((offset - 4000).abs() < 40, "smoothed offset {offset} should settle near 4000");
    assert_eq!(probe.sample_count(), 300);
}

#[test]
fn a_single_latency_step_is_absorbed_gradually_not_instantly() {
    let probe = DejitterProbe::new(8);
    let clock = TestClock::new(0);

    for _ in 0..50u64 {
        clock.advance(2700);
        let cr_prog = clock.now();
        probe.smooth(cr_prog + 1000, cr_prog);
    }

    clock.advance(2700);
    let cr_prog = clock.now();
    let stepped = probe.smooth(cr_prog + 5000, cr_prog);
    let offset_after_step = stepped as i64 - cr_prog as i64;
    // A /8 EMA moves at most 1/8th of the way toward a sudden 4000-tick
    // step in one sample: it must neither jump straight to 5000 nor
    // stay pinned at 1000.
    assert!(offset_after_step > 1000 && offset_after_step < 2000, "offset {offset_after_step} should move only partway");
}

#[test]
fn wired_through_a_probe_chain_it_writes_pts_sys_in_place() {
    // A pipe doesn't call `DejitterProbe` directly: it throws
    // `ClockRef`/`ClockTs` up its own probe chain, and whichever probe
    // in that chain is a `DejitterProbe` does the work.
    let probe: Arc<dyn Uprobe> = Arc::new(DejitterProbe::with_deviation(100, 10, 1));

    let cr_sys = u32::MAX as u64;
    let uref = Arc::new(Mutex::new(Uref::new()));
    uref.lock().ts.cr_sys = Some(cr_sys);
    throw_clock_ref(probe.as_ref(), "source.test", uref.clone(), 0, true);

    uref.lock().ts.pts_prog = Some(0);
    throw_clock_ts(probe.as_ref(), "source.test", uref.clone());

    assert_eq!(uref.lock().ts.pts_sys, Some(cr_sys + 3));
}
