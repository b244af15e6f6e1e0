//! Synchronization engine for AVSync
//!
//! This module orchestrates presentation timing: it owns the three playback
//! clocks, runs the refresh loop on a dedicated thread, computes per-frame
//! delays against the master clock, drops or duplicates frames to stay
//! locked, regulates the external clock's speed from buffer occupancy, and
//! drives the display sink.

mod sync_engine;

pub use sync_engine::SyncEngine;

/// Notifications emitted by the refresh loop
///
/// Delivered on a best-effort channel obtained from `SyncEngine::events`;
/// dropping the receiver silently ends delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncEvent {
    /// A frame was presented to the display sink
    FrameShown {
        /// Presentation timestamp of the shown frame
        pts: f64,
    },

    /// A frame was skipped without display to catch up to the master clock
    FrameDropped {
        /// Presentation timestamp of the dropped frame
        pts: f64,
    },

    /// The external-clock regulator adjusted the playback speed
    ExternalSpeedChanged {
        /// The new speed
        speed: f64,
    },
}
