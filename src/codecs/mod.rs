//! Codec-facing traits used across module boundaries.
//!
//! The decoder and encoder engines themselves are external collaborators —
//! the pipeline only depends on these seams.  Implementations: the bundled
//! raw frame container ([`raw`]), hardware codec wrappers, test doubles.

pub mod raw;

use crate::core::types::{Frame, VideoProperties};
use crate::error::Result;

// ─── Frame source (decoder → pipeline) ───────────────────────────────────

/// A bounded, lazy, non-restartable sequence of device-resident frames.
///
/// Constructed over a path, a device, and a frame range; yields at most
/// `range.len()` frames, fewer if the underlying stream is shorter.
pub trait FrameSource: Send + 'static {
    /// Stream properties, read once at open time.
    fn properties(&self) -> VideoProperties;

    /// Pull the next decoded frame, or `None` when the range is exhausted.
    ///
    /// Blocks until the frame is device-resident.  Frames come back in
    /// strictly increasing source-index order.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

// ─── Frame sink (pipeline → encoder) ─────────────────────────────────────

/// Accepts device-resident frames for encoding, in arrival order.
///
/// Most encoders require monotonic input order; the pipeline guarantees it
/// and sinks may reject violations.
pub trait FrameSink: Send + 'static {
    /// Submit one frame.  Ownership transfers to the sink for the duration
    /// of the (possibly asynchronous) encode.
    fn submit(&mut self, frame: Frame) -> Result<()>;

    /// Flush pending frames and finalise the output.
    fn flush(&mut self) -> Result<()>;
}
