//! Playback clocks for AVSync
//!
//! A [`PlaybackClock`] is a continuously advancing presentation-time
//! estimator. Instead of extrapolating from the last anchored PTS, it stores
//! the drift between PTS and wall time at the anchor, which keeps readings
//! robust to irregular update cadence. Clocks can be paused, run at a
//! non-unit speed, and be slaved to one another when they drift too far
//! apart.
//!
//! All timestamps are `f64` seconds. `NaN` means "unset" or "stale".

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic wall time in seconds, relative to a process-wide epoch
///
/// All clock arithmetic in this crate is done against this time base.
pub fn relative_time() -> f64 {
    EPOCH.elapsed().as_secs_f64()
}

#[derive(Debug)]
struct ClockState {
    /// Last anchored media timestamp in seconds; NaN when unset
    pts: f64,

    /// `pts - wall time at the anchor`
    pts_drift: f64,

    /// Wall time of the last anchor
    last_updated: f64,

    /// Playback rate; 1.0 is real time
    speed: f64,

    /// When paused, `get` returns the frozen `pts`
    paused: bool,

    /// Serial the clock was anchored with
    serial: u64,

    /// Serial cell the clock is validated against; a mismatch with the
    /// anchored serial marks the clock stale
    queue_serial: Arc<AtomicU64>,
}

/// A drift-based presentation clock
///
/// Shareable across threads by reference; every operation locks a short
/// internal critical section so each read or anchor is atomic.
#[derive(Debug)]
pub struct PlaybackClock {
    state: Mutex<ClockState>,
}

impl PlaybackClock {
    /// Create an unset clock validated against its own serial cell
    ///
    /// A self-owned cell never goes stale on its own; `attach_serial`
    /// switches validation to an external cell (e.g. a frame queue's).
    pub fn new() -> Self {
        let cell = Arc::new(AtomicU64::new(0));
        Self {
            state: Mutex::new(ClockState {
                pts: f64::NAN,
                pts_drift: f64::NAN,
                last_updated: relative_time(),
                speed: 1.0,
                paused: false,
                serial: 0,
                queue_serial: cell,
            }),
        }
    }

    /// Validate this clock against `cell` from now on
    ///
    /// The clock stays stale until the next anchor carries a serial
    /// matching the cell.
    pub fn attach_serial(&self, cell: Arc<AtomicU64>) {
        let mut state = self.state.lock();
        state.queue_serial = cell;
    }

    /// Anchor the clock at `pts` with the current wall time
    pub fn set(&self, pts: f64, serial: u64) {
        self.set_at(pts, serial, relative_time());
    }

    /// Anchor the clock at `pts` as of wall time `time`
    pub fn set_at(&self, pts: f64, serial: u64, time: f64) {
        let mut state = self.state.lock();
        state.pts = pts;
        state.last_updated = time;
        state.pts_drift = pts - time;
        state.serial = serial;
    }

    /// Current clock reading in seconds
    ///
    /// Returns NaN when the clock is unset or its serial is stale. While
    /// paused, returns the value frozen at pause time.
    pub fn get(&self) -> f64 {
        let state = self.state.lock();
        if state.serial != state.queue_serial.load(Ordering::Relaxed) {
            return f64::NAN;
        }
        if state.paused {
            return state.pts;
        }
        let time = relative_time();
        state.pts_drift + time - (time - state.last_updated) * (1.0 - state.speed)
    }

    /// Current playback speed
    pub fn speed(&self) -> f64 {
        self.state.lock().speed
    }

    /// Change the playback speed, keeping `get` continuous across the change
    pub fn set_speed(&self, speed: f64) {
        let current = self.get();
        let mut state = self.state.lock();
        if !current.is_nan() {
            let time = relative_time();
            state.pts = current;
            state.last_updated = time;
            state.pts_drift = current - time;
        }
        state.speed = speed;
    }

    /// Whether the clock is paused
    pub fn paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Pause or resume the clock
    ///
    /// Re-anchors at the current reading first, so pausing freezes the value
    /// at pause time and resuming continues from it.
    pub fn set_paused(&self, paused: bool) {
        let current = self.get();
        let mut state = self.state.lock();
        if state.paused == paused {
            return;
        }
        if !current.is_nan() {
            let time = relative_time();
            state.pts = current;
            state.last_updated = time;
            state.pts_drift = current - time;
        }
        state.paused = paused;
    }

    /// Serial of the last anchor
    pub fn serial(&self) -> u64 {
        self.state.lock().serial
    }

    /// Copy `other`'s reading into this clock if the two have diverged
    ///
    /// A no-op while `other` is invalid or the clocks agree within
    /// `no_sync_threshold`; an unset `self` always adopts a valid `other`.
    pub fn sync_to_slave(&self, other: &PlaybackClock, no_sync_threshold: f64) {
        let clock = self.get();
        let slave = other.get();
        if !slave.is_nan() && (clock.is_nan() || (clock - slave).abs() > no_sync_threshold) {
            self.set(slave, other.serial());
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}
