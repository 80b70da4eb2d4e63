//! Pipeline data contracts — frame ranges, stream properties, and the
//! device-resident frame handle.
//!
//! A [`Frame`] owns device memory for exactly one decoded image.  Ownership
//! follows the data: once a frame is handed to a sink it must not be touched
//! again by the driver.  Host visibility is only ever an explicit stream
//! download into a [`HostFrame`] — there are no implicit transfers.

use crate::core::device::DeviceBuffer;
use crate::error::{PipelineError, Result};

// ─── Frame range ─────────────────────────────────────────────────────────────

/// Half-open span `[start, end)` of source frame indices a session yields.
///
/// Immutable once a session is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRange {
    pub start: u64,
    pub end: u64,
}

impl FrameRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of frames the range selects.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Zero-length ranges are valid and select no frames.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Validate the range against the source's frame count.
    ///
    /// Rejected at session open, before any frame pull:
    /// - `start > end` (inverted range)
    /// - `start >= total_frames` for non-empty ranges
    ///
    /// `start == end` passes — the loop body simply never executes.
    pub fn validate(&self, total_frames: u64) -> Result<()> {
        if self.start > self.end || (!self.is_empty() && self.start >= total_frames) {
            return Err(PipelineError::Range {
                start: self.start,
                end: self.end,
                total_frames,
            });
        }
        Ok(())
    }
}

// ─── Stream properties ───────────────────────────────────────────────────────

/// Pixel layout of decoded frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit RGB, 3 bytes per pixel.
    Rgb24,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 => 3,
        }
    }

    /// Channel count.
    #[inline]
    pub fn channels(&self) -> u32 {
        match self {
            Self::Rgb24 => 3,
        }
    }
}

/// Source stream properties, read once at session open and immutable after.
///
/// A configured sink must match `width`/`height`/`fps` exactly; a mismatch is
/// a configuration error, not a runtime conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: u64,
    pub format: PixelFormat,
}

impl VideoProperties {
    /// Byte size of one packed frame.
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

// ─── Stream identity ─────────────────────────────────────────────────────────

/// Which device execution stream produced (or will consume) a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// Decode/display consumption stream.
    Decode,
    /// Encode submission stream.
    Encode,
}

// ─── Device-resident frame ───────────────────────────────────────────────────

/// One decoded image resident in device memory, plus layout metadata and the
/// stream it was produced on.
///
/// Exclusively owned by the pipeline iteration that received it until it is
/// forwarded to a sink, after which the sink owns it for the duration of the
/// (possibly asynchronous) encode.
pub struct Frame {
    /// Source frame index (absolute, not range-relative).
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Stream the producing copy/decode was enqueued on.
    pub produced_on: StreamKind,
    /// Device allocation holding the packed pixel data.
    pub data: DeviceBuffer,
}

impl Frame {
    /// Expected byte length of the device allocation.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// A CPU-visible copy of a frame, produced by an explicit device-to-host
/// transfer for display surfaces that require host memory.
pub struct HostFrame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_is_rejected() {
        assert!(FrameRange::new(40, 30).validate(100).is_err());
    }

    #[test]
    fn zero_length_range_is_valid() {
        FrameRange::new(0, 0).validate(100).expect("[0,0) is valid");
        FrameRange::new(7, 7).validate(5).expect("s == e is valid");
        assert_eq!(FrameRange::new(3, 3).len(), 0);
    }

    #[test]
    fn start_past_source_bounds_is_rejected() {
        let err = FrameRange::new(100, 110).validate(100).unwrap_err();
        assert_eq!(err.error_code(), 100);
        FrameRange::new(99, 110).validate(100).expect("last frame reachable");
    }

    #[test]
    fn range_length_is_half_open() {
        assert_eq!(FrameRange::new(0, 50).len(), 50);
        assert_eq!(FrameRange::new(10, 50).len(), 40);
    }

    #[test]
    fn frame_bytes_matches_packed_rgb() {
        let props = VideoProperties {
            width: 4,
            height: 2,
            fps: 24.0,
            total_frames: 1,
            format: PixelFormat::Rgb24,
        };
        assert_eq!(props.frame_bytes(), 24);
    }
}
