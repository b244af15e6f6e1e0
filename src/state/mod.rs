//! Observed player state for AVSync
//!
//! The sync loop is driven by a handful of flags a controlling player owns
//! and mutates; the engine only ever reads them. Flags are atomics so the
//! loop can sample them every tick without taking the engine mutex.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which clock other streams are resynchronized against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    /// Audio is master (default)
    Audio,

    /// Video is master; video frames are never corrected against themselves
    Video,

    /// An external wall clock is master (e.g. live sessions)
    External,
}

/// Read-only input flags the refresh loop observes
///
/// The controller holds an `Arc<PlayerState>` and mutates it; the engine
/// treats it as read-only.
pub struct PlayerState {
    sync_source: RwLock<SyncSource>,
    pause_request: AtomicBool,
    abort_request: AtomicBool,
    frame_drop: AtomicBool,
    display_disable: AtomicBool,
    real_time: AtomicBool,
}

impl PlayerState {
    /// Create the default state: audio master, frame dropping enabled
    pub fn new() -> Self {
        Self {
            sync_source: RwLock::new(SyncSource::Audio),
            pause_request: AtomicBool::new(false),
            abort_request: AtomicBool::new(false),
            frame_drop: AtomicBool::new(true),
            display_disable: AtomicBool::new(false),
            real_time: AtomicBool::new(false),
        }
    }

    /// Current master clock selection
    pub fn sync_source(&self) -> SyncSource {
        *self.sync_source.read()
    }

    /// Select the master clock
    pub fn set_sync_source(&self, source: SyncSource) {
        *self.sync_source.write() = source;
    }

    /// Whether playback is paused
    pub fn pause_requested(&self) -> bool {
        self.pause_request.load(Ordering::Acquire)
    }

    /// Request or clear pause
    pub fn set_pause_requested(&self, paused: bool) {
        self.pause_request.store(paused, Ordering::Release);
    }

    /// Whether the session is tearing down
    pub fn abort_requested(&self) -> bool {
        self.abort_request.load(Ordering::Acquire)
    }

    /// Request teardown
    pub fn set_abort_requested(&self, abort: bool) {
        self.abort_request.store(abort, Ordering::Release);
    }

    /// Whether late frames may be skipped to catch up
    pub fn frame_drop_enabled(&self) -> bool {
        self.frame_drop.load(Ordering::Acquire)
    }

    /// Enable or disable frame dropping
    pub fn set_frame_drop_enabled(&self, enabled: bool) {
        self.frame_drop.store(enabled, Ordering::Release);
    }

    /// Whether presentation is suppressed (timing still runs)
    pub fn display_disabled(&self) -> bool {
        self.display_disable.load(Ordering::Acquire)
    }

    /// Suppress or restore presentation
    pub fn set_display_disabled(&self, disabled: bool) {
        self.display_disable.store(disabled, Ordering::Release);
    }

    /// Whether the source is live rather than seekable
    pub fn real_time(&self) -> bool {
        self.real_time.load(Ordering::Acquire)
    }

    /// Mark the source as live
    pub fn set_real_time(&self, real_time: bool) {
        self.real_time.store(real_time, Ordering::Release);
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}
