//! Integration test utilities for AVSync
//!
//! Provides the scripted collaborators the engine-level scenarios run
//! against: a video source backed by a real frame queue, a silent audio
//! source with an adjustable packet backlog, capture/failing display sinks,
//! and a scaler that always fails.

use avsync::{
    AudioSource, CodecParams, DisplaySink, FrameData, FrameQueue, MediaSource, PixelFormat,
    RgbaBuffer, Scaler, SyncError, VideoFrame, VideoSource,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frame geometry used by every scripted source
pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 4;

/// Build an RGBA test frame
pub fn rgba_frame(pts: f64, duration: f64) -> VideoFrame {
    VideoFrame::new(
        pts,
        duration,
        WIDTH,
        HEIGHT,
        FrameData::Rgba {
            data: vec![0xab; (WIDTH * HEIGHT * 4) as usize],
            stride: (WIDTH * 4) as usize,
        },
    )
}

/// A video source backed by a real frame queue the test fills by hand
pub struct ScriptedVideoSource {
    queue: FrameQueue,
    packets: AtomicUsize,
}

impl ScriptedVideoSource {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: FrameQueue::new(capacity),
            packets: AtomicUsize::new(8),
        }
    }

    /// Enqueue a sequence of evenly spaced RGBA frames
    pub fn push_sequence(&self, start_pts: f64, frame_duration: f64, count: usize) {
        for index in 0..count {
            let pts = start_pts + index as f64 * frame_duration;
            self.queue
                .push(rgba_frame(pts, frame_duration))
                .expect("scripted queue capacity exceeded");
        }
    }

    /// Set the reported demuxer packet backlog
    pub fn set_packets(&self, packets: usize) {
        self.packets.store(packets, Ordering::Relaxed);
    }
}

impl MediaSource for ScriptedVideoSource {
    fn packet_size(&self) -> usize {
        self.packets.load(Ordering::Relaxed)
    }
    fn start(&self) {}
    fn stop(&self) {}
    fn flush(&self) {
        self.queue.flush();
    }
}

impl VideoSource for ScriptedVideoSource {
    fn frame_queue(&self) -> &FrameQueue {
        &self.queue
    }
    fn codec_params(&self) -> CodecParams {
        CodecParams {
            width: WIDTH,
            height: HEIGHT,
            pixel_format: PixelFormat::Rgba,
        }
    }
}

/// An audio source that only reports a packet backlog
pub struct SilentAudioSource {
    packets: AtomicUsize,
}

impl SilentAudioSource {
    pub fn new(packets: usize) -> Self {
        Self {
            packets: AtomicUsize::new(packets),
        }
    }

    pub fn set_packets(&self, packets: usize) {
        self.packets.store(packets, Ordering::Relaxed);
    }
}

impl MediaSource for SilentAudioSource {
    fn packet_size(&self) -> usize {
        self.packets.load(Ordering::Relaxed)
    }
    fn start(&self) {}
    fn stop(&self) {}
    fn flush(&self) {}
}

impl AudioSource for SilentAudioSource {}

/// A sink that counts successful presents
pub struct CaptureSink {
    presented: Arc<AtomicUsize>,
}

impl CaptureSink {
    /// Returns the sink and a shared handle to its present counter
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let presented = Arc::new(AtomicUsize::new(0));
        (
            Self {
                presented: Arc::clone(&presented),
            },
            presented,
        )
    }
}

impl DisplaySink for CaptureSink {
    fn present(&mut self, _image: &RgbaBuffer) -> avsync::Result<()> {
        self.presented.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A sink whose presents always fail
pub struct FailingSink;

impl DisplaySink for FailingSink {
    fn present(&mut self, _image: &RgbaBuffer) -> avsync::Result<()> {
        Err(SyncError::Render("no backing surface".to_string()))
    }
}

/// A scaler whose conversions always fail
pub struct FailingScaler;

impl Scaler for FailingScaler {
    fn convert_to_rgba(&mut self, _frame: &VideoFrame, _dst: &mut RgbaBuffer) -> avsync::Result<()> {
        Err(SyncError::Scaler("conversion unavailable".to_string()))
    }
}

/// Poll `predicate` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}
