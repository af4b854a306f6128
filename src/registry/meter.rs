use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::view::{MeterView, RatesView};

// ─── Configuration ───────────────────────────────────────────────

/// EWMA tick period. Rates are recomputed once per elapsed tick.
const TICK_INTERVAL: Duration = Duration::from_secs(5);

const WINDOWS_MINUTES: [f64; 3] = [1.0, 5.0, 15.0];

// ─── EWMA ────────────────────────────────────────────────────────

/// Exponentially-weighted moving average of an event rate.
#[derive(Debug, Clone, Copy)]
struct Ewma {
    alpha: f64,
    /// events per second
    rate: f64,
    initialized: bool,
}

impl Ewma {
    fn with_window(minutes: f64) -> Self {
        let tick_secs = TICK_INTERVAL.as_secs_f64();
        Self {
            alpha: 1.0 - (-tick_secs / 60.0 / minutes).exp(),
            rate: 0.0,
            initialized: false,
        }
    }

    /// Fold one tick's worth of events into the average.
    fn tick(&mut self, events: u64) {
        let instant_rate = events as f64 / TICK_INTERVAL.as_secs_f64();
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }

    /// Equivalent to `ticks` calls of `tick(0)`.
    fn decay(&mut self, ticks: u128) {
        if ticks == 0 {
            return;
        }
        if !self.initialized {
            self.tick(0);
        }
        let ticks = i32::try_from(ticks).unwrap_or(i32::MAX);
        self.rate *= (1.0 - self.alpha).powi(ticks);
    }
}

// ─── Meter ───────────────────────────────────────────────────────

/// Counts events and tracks their 1, 5 and 15 minute rates.
///
/// Ticking is lazy: every `mark` and `snapshot` first catches up on the
/// whole ticks elapsed since the last one, so no background task is needed.
#[derive(Debug)]
pub struct Meter {
    state: Mutex<MeterState>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSnapshot {
    pub count: u64,
    pub rate1: f64,
    pub rate5: f64,
    pub rate15: f64,
}

#[derive(Debug)]
struct MeterState {
    count: u64,
    /// events marked since the last tick
    uncounted: u64,
    ewmas: [Ewma; 3],
    last_tick: Instant,
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub(crate) fn started_at(start: Instant) -> Self {
        Self {
            state: Mutex::new(MeterState {
                count: 0,
                uncounted: 0,
                ewmas: WINDOWS_MINUTES.map(Ewma::with_window),
                last_tick: start,
            }),
        }
    }

    pub fn mark(&self, events: u64) {
        self.mark_at(events, Instant::now());
    }

    pub(crate) fn mark_at(&self, events: u64, now: Instant) {
        let mut state = self.state.lock();
        state.catch_up(now);
        state.count = state.count.saturating_add(events);
        state.uncounted = state.uncounted.saturating_add(events);
    }

    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub(crate) fn snapshot_at(&self, now: Instant) -> MeterSnapshot {
        let mut state = self.state.lock();
        state.catch_up(now);
        let [m1, m5, m15] = state.ewmas;
        MeterSnapshot {
            count: state.count,
            rate1: m1.rate,
            rate5: m5.rate,
            rate15: m15.rate,
        }
    }
}

impl MeterState {
    fn catch_up(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        let tick_nanos = TICK_INTERVAL.as_nanos();
        let ticks = elapsed.as_nanos() / tick_nanos;
        if ticks == 0 {
            return;
        }

        let uncounted = std::mem::take(&mut self.uncounted);
        for ewma in &mut self.ewmas {
            ewma.tick(uncounted);
            ewma.decay(ticks - 1);
        }

        let remainder = Duration::from_nanos((elapsed.as_nanos() % tick_nanos) as u64);
        self.last_tick = now.checked_sub(remainder).unwrap_or(now);
    }
}

impl RatesView for MeterSnapshot {
    fn rate1(&self) -> f64 {
        self.rate1
    }

    fn rate5(&self) -> f64 {
        self.rate5
    }

    fn rate15(&self) -> f64 {
        self.rate15
    }
}

impl MeterView for MeterSnapshot {
    fn count(&self) -> u64 {
        self.count
    }
}
