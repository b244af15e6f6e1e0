//! The refresh loop and its timing arithmetic
//!
//! The loop structure follows the classic media-player design: sleep for at
//! most one refresh period, decide whether the next decoded frame is due
//! against the master clock, drop it if it is already stale, otherwise
//! advance the queue and present. All exceptional conditions are absorbed
//! locally; the loop never fails, it only skips work.

use crate::clock::{relative_time, PlaybackClock};
use crate::engine::SyncEvent;
use crate::queue::VideoFrame;
use crate::render::{DisplaySink, RgbaBuffer, Scaler};
use crate::source::{AudioSource, VideoSource};
use crate::state::{PlayerState, SyncSource};
use crate::utils::config::SyncConfig;
use crate::utils::error::Result;
use crate::utils::AtomicF64;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, trace, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Correct a frame delay against the clock difference `diff = video - master`
///
/// Catch-up is aggressive (the delay shrinks by the full difference, down to
/// zero) while holding back is mild: short frames double their delay, long
/// frames grow linearly. Differences beyond `max_frame_duration` are not
/// credible and leave the delay untouched.
fn compute_target_delay(delay: f64, diff: f64, config: &SyncConfig, max_frame_duration: f64) -> f64 {
    let sync_threshold = delay.clamp(config.sync_threshold_min, config.sync_threshold_max);
    if diff.is_nan() || diff.abs() >= max_frame_duration {
        return delay;
    }

    if diff <= -sync_threshold {
        (delay + diff).max(0.0)
    } else if diff >= sync_threshold && delay > config.frame_dup_threshold {
        delay + diff
    } else if diff >= sync_threshold {
        2.0 * delay
    } else {
        delay
    }
}

/// Inter-frame duration, falling back to the frame's own nominal duration
/// when the PTS delta is not credible (discontinuity, wraparound, seek)
fn compute_frame_duration(a: &VideoFrame, b: &VideoFrame, max_frame_duration: f64) -> f64 {
    let duration = b.pts - a.pts;
    if duration.is_nan() || duration <= 0.0 || duration > max_frame_duration {
        a.duration
    } else {
        duration
    }
}

struct EngineInner {
    surface: Option<Box<dyn DisplaySink>>,
    scaler: Box<dyn Scaler>,
    scratch: Option<RgbaBuffer>,
}

struct Shared {
    config: SyncConfig,
    state: Arc<PlayerState>,

    audio_clock: PlaybackClock,
    video_clock: PlaybackClock,
    ext_clock: PlaybackClock,

    /// Engine mutex: guards the surface, the scaler and the scratch buffer,
    /// serializes the video/external clock pair update, and is the condvar
    /// target for the refresh sleep
    inner: Mutex<EngineInner>,
    cond: Condvar,

    abort: AtomicBool,
    force_refresh: AtomicBool,
    frame_timer_refresh: AtomicBool,
    max_frame_duration: AtomicF64,

    video: RwLock<Option<Weak<dyn VideoSource>>>,
    audio: RwLock<Option<Weak<dyn AudioSource>>>,

    events: Mutex<Option<Sender<SyncEvent>>>,
}

impl Shared {
    fn attach(&self, video: &Arc<dyn VideoSource>, audio: Option<&Arc<dyn AudioSource>>) {
        let _guard = self.inner.lock();
        self.video_clock.attach_serial(video.frame_queue().serial_cell());
        *self.video.write() = Some(Arc::downgrade(video));
        *self.audio.write() = audio.map(Arc::downgrade);
        self.abort.store(false, Ordering::Release);
        self.cond.notify_all();
    }

    fn upgrade_video(&self) -> Option<Arc<dyn VideoSource>> {
        self.video.read().as_ref().and_then(Weak::upgrade)
    }

    fn upgrade_audio(&self) -> Option<Arc<dyn AudioSource>> {
        self.audio.read().as_ref().and_then(Weak::upgrade)
    }

    fn master_clock(&self) -> f64 {
        match self.state.sync_source() {
            SyncSource::Audio => self.audio_clock.get(),
            SyncSource::Video => self.video_clock.get(),
            SyncSource::External => self.ext_clock.get(),
        }
    }

    fn target_delay(&self, delay: f64) -> f64 {
        let mut corrected = delay;
        let mut diff = 0.0;
        if self.state.sync_source() != SyncSource::Video {
            diff = self.video_clock.get() - self.master_clock();
            corrected = compute_target_delay(delay, diff, &self.config, self.max_frame_duration.load());
        }
        trace!("video: delay={:.3} A-V={:.6}", corrected, -diff);
        corrected
    }

    fn frame_duration(&self, a: &VideoFrame, b: &VideoFrame) -> f64 {
        compute_frame_duration(a, b, self.max_frame_duration.load())
    }

    /// Nudge the external clock's speed so packet-queue occupancy stays
    /// healthy: slow down when either queue is nearly drained, speed up when
    /// both are saturated, otherwise pull back toward real time one step at
    /// a time.
    fn check_external_clock_speed(&self) {
        let video = self.upgrade_video();
        let audio = self.upgrade_audio();
        let config = &self.config;

        let starved = video
            .as_ref()
            .is_some_and(|v| v.packet_size() <= config.ext_clock_min_frames)
            || audio
                .as_ref()
                .is_some_and(|a| a.packet_size() <= config.ext_clock_min_frames);
        let saturated = video
            .as_ref()
            .map_or(true, |v| v.packet_size() > config.ext_clock_max_frames)
            && audio
                .as_ref()
                .map_or(true, |a| a.packet_size() > config.ext_clock_max_frames);

        let speed = self.ext_clock.speed();
        let new_speed = if starved {
            config.ext_speed_min.max(speed - config.ext_speed_step)
        } else if saturated {
            config.ext_speed_max.min(speed + config.ext_speed_step)
        } else if speed != 1.0 {
            speed + config.ext_speed_step * (1.0 - speed) / (1.0 - speed).abs()
        } else {
            speed
        };

        if new_speed != speed {
            self.ext_clock.set_speed(new_speed);
            self.emit(SyncEvent::ExternalSpeedChanged { speed: new_speed });
        }
    }

    /// One evaluation of the presentation decision
    ///
    /// `remaining_time` is shortened when the current frame is not yet due;
    /// `frame_timer` is the wall time the frame on screen was scheduled at
    /// and is owned by the refresh thread.
    fn refresh_video(&self, remaining_time: &mut f64, frame_timer: &mut f64) {
        if !self.state.abort_requested()
            && !self.state.pause_requested()
            && self.state.real_time()
            && self.state.sync_source() == SyncSource::External
        {
            self.check_external_clock_speed();
        }

        let video = self.upgrade_video();

        if let Some(video) = video.as_ref() {
            loop {
                if self.abort.load(Ordering::Acquire) || self.state.abort_requested() {
                    break;
                }

                let queue = video.frame_queue();
                if queue.size() == 0 {
                    break;
                }

                let (Some(last), Some(current)) = (queue.last_frame(), queue.current_frame())
                else {
                    break;
                };

                if self.frame_timer_refresh.swap(false, Ordering::AcqRel) {
                    *frame_timer = relative_time();
                }

                // Paused: keep showing the last frame, do not advance.
                if self.state.abort_requested() || self.state.pause_requested() {
                    break;
                }

                let last_duration = self.frame_duration(&last, &current);
                let delay = self.target_delay(last_duration);

                let time = relative_time();
                if time < *frame_timer + delay {
                    *remaining_time = (*frame_timer + delay - time).min(*remaining_time);
                    break;
                }

                *frame_timer += delay;
                if delay > 0.0 && time - *frame_timer > self.config.sync_threshold_max {
                    *frame_timer = time;
                }

                {
                    let _inner = self.inner.lock();
                    if !current.pts.is_nan() {
                        self.video_clock.set(current.pts, current.serial);
                        self.ext_clock
                            .sync_to_slave(&self.video_clock, self.config.no_sync_threshold);
                    }
                }

                if queue.size() > 1 {
                    if let Some(next) = queue.next_frame() {
                        let duration = self.frame_duration(&current, &next);
                        if time > *frame_timer + duration
                            && self.state.frame_drop_enabled()
                            && self.state.sync_source() != SyncSource::Video
                        {
                            trace!("dropping late frame pts={:.3}", current.pts);
                            queue.pop_frame();
                            self.emit(SyncEvent::FrameDropped { pts: current.pts });
                            continue;
                        }
                    }
                }

                queue.pop_frame();
                self.force_refresh.store(true, Ordering::Release);
                break;
            }
        }

        if !self.state.display_disabled()
            && self.force_refresh.load(Ordering::Acquire)
            && video.as_ref().is_some_and(|v| v.frame_queue().has_shown())
        {
            if let Some(video) = video.as_ref() {
                self.render_video(video.as_ref());
            }
        }
        self.force_refresh.store(false, Ordering::Release);
    }

    /// Convert and present the frame currently on screen
    ///
    /// Runs entirely under the engine mutex, so a surface swap can never
    /// race an in-flight present.
    fn render_video(&self, video: &dyn VideoSource) {
        let queue = video.frame_queue();
        let Some(frame) = queue.last_frame() else {
            return;
        };
        let params = video.codec_params();

        let mut inner = self.inner.lock();
        let inner = &mut *inner;

        if !frame.is_uploaded() {
            let scratch = inner
                .scratch
                .get_or_insert_with(|| RgbaBuffer::new(params.width, params.height));
            if scratch.width() != params.width || scratch.height() != params.height {
                *scratch = RgbaBuffer::new(params.width, params.height);
            }

            if let Err(err) = inner.scaler.convert_to_rgba(&frame, scratch) {
                warn!("frame conversion failed, skipping render: {}", err);
                return;
            }
            frame.mark_uploaded();
        }

        if let (Some(surface), Some(scratch)) = (inner.surface.as_mut(), inner.scratch.as_ref()) {
            match surface.present(scratch) {
                Ok(()) => self.emit(SyncEvent::FrameShown { pts: frame.pts }),
                Err(err) => warn!("present failed: {}", err),
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        let mut guard = self.events.lock();
        if let Some(tx) = guard.as_ref() {
            if tx.send(event).is_err() {
                *guard = None;
            }
        }
    }
}

/// The synchronization engine
///
/// Owns the audio/video/external clocks and the refresh thread. Created at
/// player construction; `start` attaches the decoders and launches the
/// loop, `stop` tears it down and joins. Dropping the engine stops it.
pub struct SyncEngine {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Create an engine with the given configuration, observed player state
    /// and pixel converter
    pub fn new(config: SyncConfig, state: Arc<PlayerState>, scaler: Box<dyn Scaler>) -> Result<Self> {
        config.validate()?;
        let max_frame_duration = AtomicF64::new(config.max_frame_duration);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                state,
                audio_clock: PlaybackClock::new(),
                video_clock: PlaybackClock::new(),
                ext_clock: PlaybackClock::new(),
                inner: Mutex::new(EngineInner {
                    surface: None,
                    scaler,
                    scratch: None,
                }),
                cond: Condvar::new(),
                abort: AtomicBool::new(false),
                force_refresh: AtomicBool::new(false),
                frame_timer_refresh: AtomicBool::new(false),
                max_frame_duration,
                video: RwLock::new(None),
                audio: RwLock::new(None),
                events: Mutex::new(None),
            }),
            thread: Mutex::new(None),
        })
    }

    /// Attach the decoders and launch the refresh loop
    ///
    /// The engine keeps only weak references; a dropped decoder turns every
    /// tick into a no-op. The video clock is revalidated against the frame
    /// queue's serial.
    pub fn start(&self, video: &Arc<dyn VideoSource>, audio: Option<&Arc<dyn AudioSource>>) {
        self.shared.attach(video, audio);

        let mut thread = self.thread.lock();
        if thread.is_none() {
            info!("starting sync refresh loop");
            let shared = Arc::clone(&self.shared);
            *thread = Some(thread::spawn(move || run_loop(shared)));
        }
    }

    /// Stop the refresh loop and join it; idempotent
    pub fn stop(&self) {
        {
            let _guard = self.shared.inner.lock();
            self.shared.abort.store(true, Ordering::Release);
            self.shared.cond.notify_all();
        }

        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
            info!("sync refresh loop stopped");
        }
    }

    /// Install (or remove) the display sink
    ///
    /// The previous sink is released under the engine mutex, atomically with
    /// respect to any in-flight present.
    pub fn set_surface(&self, surface: Option<Box<dyn DisplaySink>>) {
        let mut inner = self.shared.inner.lock();
        inner.surface = surface;
        self.shared.cond.notify_all();
    }

    /// Update the upper bound on a credible inter-frame delta
    ///
    /// Typically 10 s for seekable media and 3600 s for live sessions.
    pub fn set_max_duration(&self, seconds: f64) {
        self.shared.max_frame_duration.store(seconds);
    }

    /// Re-anchor the frame timer on the next tick; call after a seek completes
    pub fn refresh_video_timer(&self) {
        let _guard = self.shared.inner.lock();
        self.shared.frame_timer_refresh.store(true, Ordering::Release);
        self.shared.cond.notify_all();
    }

    /// Anchor the audio clock after a rendered audio buffer
    ///
    /// `time` is the wall time (in [`relative_time`] seconds) the buffer's
    /// tail will actually hit the device. The external clock is slaved to
    /// the fresh audio clock. Deliberately lock-free with respect to the
    /// engine mutex: clock reads tolerate mild staleness.
    pub fn update_audio_clock(&self, pts: f64, time: f64) {
        let shared = &self.shared;
        shared.audio_clock.set_at(pts, shared.audio_clock.serial(), time);
        shared
            .ext_clock
            .sync_to_slave(&shared.audio_clock, shared.config.no_sync_threshold);
    }

    /// Anchor the external clock
    pub fn update_external_clock(&self, pts: f64) {
        let shared = &self.shared;
        shared.ext_clock.set(pts, shared.ext_clock.serial());
    }

    /// Difference between the audio clock and the master clock, in seconds
    pub fn get_audio_diff_clock(&self) -> f64 {
        self.shared.audio_clock.get() - self.shared.master_clock()
    }

    /// Current master clock reading, in seconds
    ///
    /// NaN while the selected master has no valid anchor yet.
    pub fn get_master_clock(&self) -> f64 {
        self.shared.master_clock()
    }

    /// The audio clock
    pub fn audio_clock(&self) -> &PlaybackClock {
        &self.shared.audio_clock
    }

    /// The video clock
    pub fn video_clock(&self) -> &PlaybackClock {
        &self.shared.video_clock
    }

    /// The external clock
    pub fn external_clock(&self) -> &PlaybackClock {
        &self.shared.ext_clock
    }

    /// Subscribe to refresh-loop notifications
    ///
    /// Replaces any previous subscription.
    pub fn events(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = unbounded();
        *self.shared.events.lock() = Some(tx);
        rx
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(shared: Arc<Shared>) {
    debug!("sync refresh loop running");
    let mut remaining_time = 0.0;
    let mut frame_timer = 0.0;
    let mut was_paused = false;

    loop {
        if shared.abort.load(Ordering::Acquire) || shared.state.abort_requested() {
            break;
        }

        if remaining_time > 0.0 {
            let mut inner = shared.inner.lock();
            if !shared.abort.load(Ordering::Acquire) {
                let _ = shared
                    .cond
                    .wait_for(&mut inner, Duration::from_secs_f64(remaining_time));
            }
        }
        remaining_time = shared.config.refresh_rate;

        let paused = shared.state.pause_requested();
        if paused != was_paused {
            shared.audio_clock.set_paused(paused);
            shared.video_clock.set_paused(paused);
            shared.ext_clock.set_paused(paused);
            was_paused = paused;
        }

        if !paused || shared.force_refresh.load(Ordering::Acquire) {
            shared.refresh_video(&mut remaining_time, &mut frame_timer);
        }
    }

    debug!("sync refresh loop exited");
}
