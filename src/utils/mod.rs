//! Utility module for AVSync
//!
//! This module provides common utilities used throughout the crate:
//! - Error handling with custom error types
//! - Configuration management
//! - Small shared helpers

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::SyncConfig;
pub use error::{Result, SyncError};

use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` readable and writable atomically via its bit pattern
///
/// Used for values a controller thread updates while the refresh loop
/// reads them every tick (e.g. the maximum credible frame duration).
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    /// Create a new atomic holding `value`
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    /// Load the current value
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Store a new value
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Format a clock reading for display
///
/// NaN clocks render as `--:--`; everything else as "MM:SS.mmm" or
/// "HH:MM:SS.mmm" past the hour mark.
pub fn format_clock(seconds: f64) -> String {
    if seconds.is_nan() {
        return "--:--".to_string();
    }

    let total = seconds.max(0.0);
    let hours = (total / 3600.0) as u64;
    let minutes = ((total % 3600.0) / 60.0) as u64;
    let secs = total % 60.0;

    if hours > 0 {
        format!("{:02}:{:02}:{:06.3}", hours, minutes, secs)
    } else {
        format!("{:02}:{:06.3}", minutes, secs)
    }
}
