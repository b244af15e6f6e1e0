//! Synthetic end-to-end playback demo
//!
//! Feeds the sync engine a generated 25 fps RGBA pattern, drives the audio
//! clock from wall time, and prints every presented frame. Run with:
//!
//! ```text
//! RUST_LOG=debug cargo run --example synthetic_playback
//! ```

use avsync::clock::relative_time;
use avsync::{
    AudioSource, CodecParams, DisplaySink, FrameData, FrameQueue, MediaSource, PassthroughScaler,
    PixelFormat, PlayerState, RgbaBuffer, SyncConfig, SyncEngine, VideoFrame, VideoSource,
};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 18;
const FRAME_DURATION: f64 = 0.04; // 25 fps

struct SyntheticVideo {
    queue: FrameQueue,
    running: AtomicBool,
}

impl MediaSource for SyntheticVideo {
    fn packet_size(&self) -> usize {
        self.queue.size()
    }
    fn start(&self) {
        self.running.store(true, Ordering::Release);
    }
    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
    fn flush(&self) {
        self.queue.flush();
    }
}

impl VideoSource for SyntheticVideo {
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

struct SilentAudio;

impl MediaSource for SilentAudio {
    fn packet_size(&self) -> usize {
        8
    }
    fn start(&self) {}
    fn stop(&self) {}
    fn flush(&self) {}
}

impl AudioSource for SilentAudio {}

struct ConsoleSink;

impl DisplaySink for ConsoleSink {
    fn present(&mut self, image: &RgbaBuffer) -> avsync::Result<()> {
        println!(
            "presented {}x{} frame, first pixel r={}",
            image.width(),
            image.height(),
            image.bytes()[0]
        );
        Ok(())
    }
}

fn pattern_frame(index: u64) -> VideoFrame {
    let shade = (index * 16 % 256) as u8;
    let mut data = vec![0u8; (WIDTH * HEIGHT * 4) as usize];
    for pixel in data.chunks_exact_mut(4) {
        pixel.copy_from_slice(&[shade, 64, 255 - shade, 255]);
    }
    VideoFrame::new(
        index as f64 * FRAME_DURATION,
        FRAME_DURATION,
        WIDTH,
        HEIGHT,
        FrameData::Rgba {
            data,
            stride: (WIDTH * 4) as usize,
        },
    )
}

fn main() -> avsync::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let state = Arc::new(PlayerState::new());
    let engine = SyncEngine::new(SyncConfig::default(), Arc::clone(&state), Box::new(PassthroughScaler))?;
    engine.set_surface(Some(Box::new(ConsoleSink)));

    let video = Arc::new(SyntheticVideo {
        queue: FrameQueue::new(16),
        running: AtomicBool::new(false),
    });
    let video_source: Arc<dyn VideoSource> = Arc::clone(&video) as Arc<dyn VideoSource>;
    let audio_source: Arc<dyn AudioSource> = Arc::new(SilentAudio);

    video.start();
    engine.start(&video_source, Some(&audio_source));

    // Producer: keep the queue topped up with pattern frames.
    let producer_video = Arc::clone(&video);
    let producer = std::thread::spawn(move || {
        let mut index = 0u64;
        while producer_video.running.load(Ordering::Acquire) && index < 50 {
            if producer_video.queue.push(pattern_frame(index)).is_ok() {
                index += 1;
            } else {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    });

    // Audio path: report wall-time progress as the audio position.
    let start = relative_time();
    for _ in 0..100 {
        engine.update_audio_clock(relative_time() - start, relative_time());
        std::thread::sleep(Duration::from_millis(20));
    }

    info!("master clock at {:.3}s", engine.get_master_clock());

    video.stop();
    producer.join().ok();
    engine.stop();
    Ok(())
}
