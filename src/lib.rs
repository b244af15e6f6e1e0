//! AVSync - a frame-accurate audio/video synchronization engine
//!
//! This crate implements the timing core of a media player: three playback
//! clocks (audio, video, external), a periodic refresh loop that decides when
//! each decoded video frame is presented against the chosen master clock,
//! frame drop/duplication policy, and external-clock speed regulation.
//!
//! Demuxing, decoding and windowing stay outside the crate. Decoders are
//! reached through the [`source`] traits, pixel conversion through an
//! injected [`render::Scaler`], and presentation through a
//! [`render::DisplaySink`]. The engine borrows frames from an externally
//! filled [`queue::FrameQueue`] and never owns them.

pub mod clock;
pub mod engine;
pub mod queue;
pub mod render;
pub mod source;
pub mod state;
pub mod utils;

pub use clock::PlaybackClock;
pub use engine::{SyncEngine, SyncEvent};
pub use queue::{FrameData, FrameQueue, VideoFrame};
pub use render::{DisplaySink, PassthroughScaler, RgbaBuffer, Scaler};
pub use source::{AudioSource, CodecParams, MediaSource, PixelFormat, VideoSource};
pub use state::{PlayerState, SyncSource};
pub use utils::config::SyncConfig;
pub use utils::error::{Result, SyncError};
