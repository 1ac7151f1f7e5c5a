//! A probe that catches `CLOCK_REF`/`CLOCK_TS` events and writes a
//! dejittered `pts_sys` onto the `uref`, so downstream pipes see
//! steadily increasing system timestamps even when the source
//! delivers bursty or jittery arrivals (spec §3.7, §4.3, exercised by
//! the scenario in spec §8 using [`crate::uclock::TestClock`]).
//!
//! This tracks two running estimates, matching `uprobe_dejitter.h`'s
//! field list: `offset` (an EMA of `cr_sys - cr_prog`, smoothing
//! parameter `1/offset_divider`) and `deviation` (an EMA of the
//! absolute error against that offset, smoothing parameter
//! `1/deviation_divider`). `pts_sys` is written as `pts_prog + offset
//! + 3 * max(deviation, minimum_deviation)`: the margin gives a
//! downstream buffer enough slack to absorb the jitter actually
//! observed rather than just the average.
//!
//! A `discontinuity` clock ref (stream restart) or the very first
//! clock ref seeds `offset` directly from the raw observation instead
//! of smoothing it in — there is nothing to smooth against yet.

use parking_lot::Mutex;

use super::{Uprobe, UprobeEvent};
use crate::error::{UError, UResult};
use crate::uref::Uref;

/// Safety margin, in deviations, added on top of the smoothed offset
/// when computing `pts_sys`.
const DEVIATION_MARGIN: f64 = 3.0;

struct State {
    offset_divider: u32,
    deviation_divider: u32,
    offset_count: u64,
    offset: f64,
    deviation_count: u64,
    deviation: f64,
    minimum_deviation: f64,
}

pub struct DejitterProbe {
    state: Mutex<State>,
}

impl DejitterProbe {
    /// A probe with no initial deviation estimate and the same
    /// divider used for both the offset and deviation EMAs.
    pub fn new(divider: u32) -> Self {
        Self::with_deviation(divider, divider, 0)
    }

    /// Full constructor mirroring `uprobe_dejitter_alloc`'s `deviation`
    /// parameter: a nonzero `initial_deviation` seeds the deviation
    /// estimate before any sample has been observed, so the very
    /// first `pts_sys` already carries a margin instead of none.
    pub fn with_deviation(offset_divider: u32, deviation_divider: u32, initial_deviation: u64) -> Self {
        DejitterProbe {
            state: Mutex::new(State {
                offset_divider: offset_divider.max(1),
                deviation_divider: deviation_divider.max(1),
                offset_count: 0,
                offset: 0.0,
                deviation_count: 0,
                deviation: initial_deviation as f64,
                minimum_deviation: 0.0,
            }),
        }
    }

    /// Sets a floor under the deviation estimate used in the
    /// `pts_sys` margin, below which it never drops even if observed
    /// jitter is smaller.
    pub fn set_minimum_deviation(&self, deviation: u64) {
        self.state.lock().minimum_deviation = deviation as f64;
    }

    /// Feed one `(cr_sys, cr_prog, discontinuity)` observation,
    /// updating the offset and deviation estimates.
    pub fn observe_clock_ref(&self, cr_sys: u64, cr_prog: u64, discontinuity: bool) {
        let observed = cr_sys as f64 - cr_prog as f64;
        let mut st = self.state.lock();
        if st.offset_count == 0 || discontinuity {
            st.offset = observed;
        } else {
            let delta = observed - st.offset;
            st.offset += delta / st.offset_divider as f64;
            let abs_delta = delta.abs();
            if st.deviation_count == 0 {
                st.deviation = abs_delta;
            } else {
                st.deviation += (abs_delta - st.deviation) / st.deviation_divider as f64;
            }
            st.deviation_count += 1;
        }
        st.offset_count += 1;
    }

    /// The bare offset-only estimate of `cr_sys` at `cr_prog`, with no
    /// deviation margin applied. Feeds `observe_clock_ref` with
    /// `discontinuity = false`, so a reference that should reset the
    /// estimate must go through that method directly instead.
    pub fn smooth(&self, cr_sys: u64, cr_prog: u64) -> u64 {
        self.observe_clock_ref(cr_sys, cr_prog, false);
        let st = self.state.lock();
        (cr_prog as f64 + st.offset).round() as u64
    }

    /// The value `pts_sys` should take for a reference at `pts_prog`,
    /// the smoothed offset plus a margin of [`DEVIATION_MARGIN`]
    /// deviations.
    pub fn pts_sys(&self, pts_prog: u64) -> u64 {
        let st = self.state.lock();
        let deviation = st.deviation.max(st.minimum_deviation);
        (pts_prog as f64 + st.offset + DEVIATION_MARGIN * deviation).round() as u64
    }

    pub fn sample_count(&self) -> u64 {
        self.state.lock().offset_count
    }
}

impl Uprobe for DejitterProbe {
    /// Updates the offset/deviation estimate on `ClockRef`, writes
    /// `pts_sys` in place on `ClockTs`, and otherwise ignores the
    /// event. Always returns `Unhandled` — dejittering is a side
    /// effect on the way past, not something that should stop the
    /// event from reaching probes further down the chain.
    fn throw(&self, _pipe_name: &str, event: &UprobeEvent) -> UResult<()> {
        match event {
            UprobeEvent::ClockRef { uref, cr_prog, discontinuity } => {
                let cr_sys = uref.lock().ts.cr_sys.ok_or(UError::Invalid)?;
                self.observe_clock_ref(cr_sys, *cr_prog, *discontinuity);
            }
            UprobeEvent::ClockTs { uref } => {
                let pts_prog = uref.lock().ts.pts_prog.ok_or(UError::Invalid)?;
                let pts_sys = self.pts_sys(pts_prog);
                uref.lock().ts.pts_sys = Some(pts_sys);
            }
            _ => {}
        }
        Err(UError::Unhandled)
    }
}
