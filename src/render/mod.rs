//! Presentation path for AVSync
//!
//! The engine converts the frame being shown into a reusable RGBA scratch
//! buffer through an injected [`Scaler`], then hands the buffer to the
//! installed [`DisplaySink`]. Both sides of the conversion carry explicit
//! row strides; sinks whose destination stride differs copy row by row.

use crate::queue::{FrameData, VideoFrame};
use crate::utils::error::{Result, SyncError};

/// An RGBA image with an explicit row stride
///
/// The engine keeps one of these as its conversion scratch buffer, sized
/// from the video source's codec parameters and reallocated when the
/// stream geometry changes.
#[derive(Debug, Clone)]
pub struct RgbaBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: usize,
}

impl RgbaBuffer {
    /// Allocate a zeroed buffer with a tightly packed stride
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width as usize * 4;
        Self {
            data: vec![0; stride * height as usize],
            width,
            height,
            stride,
        }
    }

    /// Image width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in bytes
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Pixel bytes, `stride * height` long
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel bytes
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Copy `height` rows of `row_len` bytes between buffers with differing strides
///
/// Rows beyond either buffer's extent are left untouched, so a short source
/// cannot panic the copy.
pub fn copy_rows(src: &[u8], src_stride: usize, dst: &mut [u8], dst_stride: usize, row_len: usize, height: usize) {
    for row in 0..height {
        let src_off = row * src_stride;
        let dst_off = row * dst_stride;
        if src_off + row_len > src.len() || dst_off + row_len > dst.len() {
            break;
        }
        dst[dst_off..dst_off + row_len].copy_from_slice(&src[src_off..src_off + row_len]);
    }
}

/// Abstract presentation surface
///
/// Implementations hide the windowing system. `present` receives a fully
/// converted RGBA image; a sink with a different destination stride copies
/// row by row (see [`copy_rows`]).
pub trait DisplaySink: Send {
    /// Present one frame
    fn present(&mut self, image: &RgbaBuffer) -> Result<()>;
}

/// Pixel-format converter injected into the engine
pub trait Scaler: Send {
    /// Convert a decoded frame into `dst`
    ///
    /// `dst` is already sized to the stream geometry; implementations must
    /// honor both strides.
    fn convert_to_rgba(&mut self, frame: &VideoFrame, dst: &mut RgbaBuffer) -> Result<()>;
}

/// Scaler for sources that already decode to RGBA
///
/// Copies the source rows into the scratch buffer and rejects any other
/// pixel layout. Tests and the demo use it as the identity converter; a
/// production build wraps a real converter behind the same trait.
pub struct PassthroughScaler;

impl Scaler for PassthroughScaler {
    fn convert_to_rgba(&mut self, frame: &VideoFrame, dst: &mut RgbaBuffer) -> Result<()> {
        let FrameData::Rgba { data, stride } = &frame.data else {
            return Err(SyncError::Scaler(
                "passthrough scaler requires RGBA input".to_string(),
            ));
        };

        let row_len = (frame.width.min(dst.width()) as usize) * 4;
        let height = frame.height.min(dst.height()) as usize;
        let src_stride = *stride;
        let dst_stride = dst.stride();
        copy_rows(data, src_stride, dst.bytes_mut(), dst_stride, row_len, height);
        Ok(())
    }
}
