//! Decoder collaborator traits for AVSync
//!
//! The engine never demuxes or decodes. It reaches the decoders that do
//! through these capability traits and holds only weak references to them,
//! so a torn-down pipeline simply makes every tick a no-op. Decoders never
//! reach back into the engine except through the explicit clock-update
//! entry points on `SyncEngine`.

use crate::queue::FrameQueue;

/// Pixel layout a video source decodes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUV 4:2:0 planar
    Yuv420p,

    /// Y plane + interleaved UV
    Nv12,

    /// 4 bytes per pixel, no conversion needed
    Rgba,
}

/// Geometry and pixel layout of a decoded stream
#[derive(Debug, Clone, Copy)]
pub struct CodecParams {
    /// Coded width in pixels
    pub width: u32,

    /// Coded height in pixels
    pub height: u32,

    /// Decoded pixel layout
    pub pixel_format: PixelFormat,
}

/// Common capabilities of a stream decoder
pub trait MediaSource: Send + Sync {
    /// Number of demuxed packets waiting to be decoded
    ///
    /// External-clock regulation uses this as a buffer-health signal.
    fn packet_size(&self) -> usize;

    /// Begin decoding
    fn start(&self);

    /// Stop decoding
    fn stop(&self);

    /// Discard buffered packets and frames (e.g. on seek)
    fn flush(&self);
}

/// A video decoder feeding a frame queue
pub trait VideoSource: MediaSource {
    /// The queue of decoded frames this source fills
    fn frame_queue(&self) -> &FrameQueue;

    /// Geometry and pixel layout of the decoded stream
    fn codec_params(&self) -> CodecParams;
}

/// An audio decoder
///
/// The audio path only contributes its packet occupancy here; rendered
/// audio reports its position through `SyncEngine::update_audio_clock`.
pub trait AudioSource: MediaSource {}
