//! Decoded-frame buffering for AVSync
//!
//! Provides a thread-safe bounded queue of decoded frames with the
//! keep-last protocol the sync loop relies on: the frame most recently
//! advanced to stays at the front as the "shown" frame (so it can be
//! re-presented on a forced refresh) while `current`/`next` peek at the
//! undisplayed tail. The video decoder owns and fills the queue; the sync
//! engine only peeks, pops and flips the upload flag.

use crate::utils::error::{Result, SyncError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Pixel data of a decoded frame
///
/// Strides are in bytes and may exceed the visible row width.
#[derive(Debug, Clone)]
pub enum FrameData {
    /// YUV 4:2:0 planar format (most common for video)
    Yuv420 {
        y_plane: Vec<u8>,
        u_plane: Vec<u8>,
        v_plane: Vec<u8>,
        y_stride: usize,
        uv_stride: usize,
    },

    /// NV12 format (Y plane + interleaved UV)
    Nv12 {
        y_plane: Vec<u8>,
        uv_plane: Vec<u8>,
        y_stride: usize,
        uv_stride: usize,
    },

    /// RGBA format (4 bytes per pixel)
    Rgba { data: Vec<u8>, stride: usize },
}

/// A decoded video frame plus presentation metadata
///
/// Owned by the [`FrameQueue`], borrowed by the engine as `Arc<VideoFrame>`.
/// The pixel data is immutable after decode; the only mutation the engine
/// performs is flipping `uploaded` once the frame has been converted.
#[derive(Debug)]
pub struct VideoFrame {
    /// Presentation timestamp in seconds; NaN when unknown
    pub pts: f64,

    /// Nominal duration in seconds, used when the inter-frame delta is
    /// not credible
    pub duration: f64,

    /// Queue serial the frame was enqueued under
    pub serial: u64,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Pixel planes
    pub data: FrameData,

    uploaded: AtomicBool,
}

impl VideoFrame {
    /// Create a frame; the serial is stamped by `FrameQueue::push`
    pub fn new(pts: f64, duration: f64, width: u32, height: u32, data: FrameData) -> Self {
        Self {
            pts,
            duration,
            serial: 0,
            width,
            height,
            data,
            uploaded: AtomicBool::new(false),
        }
    }

    /// Whether the frame has already been converted for display
    pub fn is_uploaded(&self) -> bool {
        self.uploaded.load(Ordering::Acquire)
    }

    /// Mark the frame as converted
    pub fn mark_uploaded(&self) {
        self.uploaded.store(true, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    frames: VecDeque<Arc<VideoFrame>>,
    /// Whether the front frame has been shown (keep-last protocol)
    shown: bool,
}

/// Bounded queue of decoded frames with keep-last semantics
///
/// - `last_frame` is the frame currently on screen (once one has been shown)
/// - `current_frame` is the next undisplayed frame
/// - `size` counts undisplayed frames only
/// - the first `pop_frame` after a flush only marks the front as shown;
///   subsequent pops discard the previous last frame and advance
pub struct FrameQueue {
    inner: Mutex<QueueInner>,
    serial: Arc<AtomicU64>,
    capacity: usize,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            serial: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Enqueue a decoded frame, stamping it with the current queue serial
    ///
    /// Fails when the queue is full; the producer decides whether to wait
    /// or drop.
    pub fn push(&self, mut frame: VideoFrame) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.frames.len() >= self.capacity {
            return Err(SyncError::Queue("frame queue is full".to_string()));
        }
        frame.serial = self.serial.load(Ordering::Relaxed);
        inner.frames.push_back(Arc::new(frame));
        Ok(())
    }

    /// Number of undisplayed frames
    pub fn size(&self) -> usize {
        let inner = self.inner.lock();
        inner.frames.len().saturating_sub(inner.shown as usize)
    }

    /// Whether any frame has been shown since the last flush
    pub fn has_shown(&self) -> bool {
        self.inner.lock().shown
    }

    /// The frame currently on screen (or about to be, before the first pop)
    pub fn last_frame(&self) -> Option<Arc<VideoFrame>> {
        self.inner.lock().frames.front().cloned()
    }

    /// The next undisplayed frame
    pub fn current_frame(&self) -> Option<Arc<VideoFrame>> {
        let inner = self.inner.lock();
        inner.frames.get(inner.shown as usize).cloned()
    }

    /// The frame after the next undisplayed one
    pub fn next_frame(&self) -> Option<Arc<VideoFrame>> {
        let inner = self.inner.lock();
        inner.frames.get(inner.shown as usize + 1).cloned()
    }

    /// Advance past the current frame
    ///
    /// The popped frame becomes the new `last_frame`; the previous last
    /// frame is released.
    pub fn pop_frame(&self) {
        let mut inner = self.inner.lock();
        if !inner.shown {
            if !inner.frames.is_empty() {
                inner.shown = true;
            }
            return;
        }
        inner.frames.pop_front();
    }

    /// Drop every frame and invalidate clocks anchored to them
    ///
    /// Bumps the queue serial, so a clock anchored to a pre-flush frame
    /// reads NaN until re-anchored.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        inner.frames.clear();
        inner.shown = false;
        self.serial.fetch_add(1, Ordering::Relaxed);
    }

    /// Current queue serial
    pub fn serial(&self) -> u64 {
        self.serial.load(Ordering::Relaxed)
    }

    /// Shared handle to the serial cell, for clock validation
    pub fn serial_cell(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.serial)
    }
}
