//! Raw frame container — the bundled [`FrameSource`]/[`FrameSink`] pair.
//!
//! # Format (`.fvr`)
//!
//! ```text
//! offset  size  field
//! 0       4     magic "FVR1"
//! 4       4     width        (u32 LE)
//! 8       4     height       (u32 LE)
//! 12      4     channels     (u32 LE, currently 3 = RGB24)
//! 16      8     fps          (f64 LE)
//! 24      8     total_frames (u64 LE)
//! 32      —     packed frames, width*height*channels bytes each
//! ```
//!
//! The source reads the header once at open, seeks to `range.start`, and
//! yields at most `range.len()` frames — never renumbering beyond what the
//! file actually holds.  The sink writes frames in arrival order and patches
//! `total_frames` into the header on `flush()`, so its output is re-openable
//! as a source.
//!
//! This is the MVP container: it keeps the full pipeline runnable and
//! benchmarkable with no codec SDK.  Hardware decoder/encoder wrappers plug
//! in behind the same traits.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::codecs::{FrameSink, FrameSource};
use crate::core::context::StreamCoordinator;
use crate::core::types::{Frame, FrameRange, PixelFormat, StreamKind, VideoProperties};
use crate::error::{PipelineError, Result};

const MAGIC: &[u8; 4] = b"FVR1";
const HEADER_LEN: u64 = 32;
const TOTAL_FRAMES_OFFSET: u64 = 24;

fn parse_header(bytes: &[u8; 32], path: &Path) -> Result<VideoProperties> {
    if &bytes[0..4] != MAGIC {
        return Err(PipelineError::Source(format!(
            "{}: not a raw frame container (bad magic)",
            path.display()
        )));
    }
    let width = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    let height = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    let channels = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
    let fps = f64::from_le_bytes(bytes[16..24].try_into().unwrap());
    let total_frames = u64::from_le_bytes(bytes[24..32].try_into().unwrap());

    if channels != 3 {
        return Err(PipelineError::Source(format!(
            "{}: unsupported channel count {channels}",
            path.display()
        )));
    }
    if width == 0 || height == 0 {
        return Err(PipelineError::Source(format!(
            "{}: degenerate dimensions {width}x{height}",
            path.display()
        )));
    }

    Ok(VideoProperties {
        width,
        height,
        fps,
        total_frames,
        format: PixelFormat::Rgb24,
    })
}

fn encode_header(props: &VideoProperties, total_frames: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[0..4].copy_from_slice(MAGIC);
    out[4..8].copy_from_slice(&props.width.to_le_bytes());
    out[8..12].copy_from_slice(&props.height.to_le_bytes());
    out[12..16].copy_from_slice(&props.format.channels().to_le_bytes());
    out[16..24].copy_from_slice(&props.fps.to_le_bytes());
    out[24..32].copy_from_slice(&total_frames.to_le_bytes());
    out
}

/// Read only the header of a container — used by `--probe`.
pub fn probe(path: &Path) -> Result<VideoProperties> {
    let mut file = File::open(path)
        .map_err(|e| PipelineError::Source(format!("{}: {e}", path.display())))?;
    let mut header = [0u8; 32];
    file.read_exact(&mut header)
        .map_err(|e| PipelineError::Source(format!("{}: short header: {e}", path.display())))?;
    parse_header(&header, path)
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// Reads packed frames from a container file and uploads each to device
/// memory on the decode stream.
pub struct RawFrameSource {
    reader: BufReader<File>,
    coordinator: Arc<StreamCoordinator>,
    properties: VideoProperties,
    range: FrameRange,
    /// Absolute index of the next frame to yield.
    cursor: u64,
    path: PathBuf,
}

impl std::fmt::Debug for RawFrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrameSource")
            .field("properties", &self.properties)
            .field("range", &self.range)
            .field("cursor", &self.cursor)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RawFrameSource {
    /// Open the container and position the cursor at `range.start`.
    ///
    /// Range validity against `total_frames` is the session's concern; the
    /// source just never yields past the end of the file or the range.
    pub fn open(
        path: &Path,
        coordinator: Arc<StreamCoordinator>,
        range: FrameRange,
    ) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| PipelineError::Source(format!("{}: {e}", path.display())))?;
        let mut header = [0u8; 32];
        file.read_exact(&mut header)
            .map_err(|e| PipelineError::Source(format!("{}: short header: {e}", path.display())))?;
        let properties = parse_header(&header, path)?;

        let frame_bytes = properties.frame_bytes() as u64;
        let mut reader = BufReader::new(file);
        // Empty ranges yield nothing; no seek needed.  For non-empty ranges
        // an offset that overflows can never be inside the file.
        if !range.is_empty() {
            let offset = range
                .start
                .checked_mul(frame_bytes)
                .and_then(|o| o.checked_add(HEADER_LEN))
                .ok_or(PipelineError::Range {
                    start: range.start,
                    end: range.end,
                    total_frames: properties.total_frames,
                })?;
            reader
                .seek(SeekFrom::Start(offset))
                .map_err(|e| PipelineError::Source(format!("{}: seek: {e}", path.display())))?;
        }

        info!(
            path = %path.display(),
            width = properties.width,
            height = properties.height,
            fps = properties.fps,
            total_frames = properties.total_frames,
            start = range.start,
            end = range.end,
            "Frame source opened"
        );

        Ok(Self {
            reader,
            coordinator,
            properties,
            range,
            cursor: range.start,
            path: path.to_path_buf(),
        })
    }
}

impl FrameSource for RawFrameSource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.range.end {
            return Ok(None);
        }

        let mut pixels = vec![0u8; self.properties.frame_bytes()];
        match self.reader.read_exact(&mut pixels) {
            Ok(()) => {}
            // Source shorter than the range — end of sequence, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                return Err(PipelineError::Source(format!(
                    "{}: frame {}: {e}",
                    self.path.display(),
                    self.cursor
                )))
            }
        }

        let data = self
            .coordinator
            .with_decode_stream(|stream| stream.upload(&pixels))?;
        let frame = Frame {
            index: self.cursor,
            width: self.properties.width,
            height: self.properties.height,
            format: self.properties.format,
            produced_on: StreamKind::Decode,
            data,
        };
        self.cursor += 1;
        Ok(Some(frame))
    }
}

impl Drop for RawFrameSource {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), last_index = self.cursor, "Frame source released");
    }
}

// ─── Sink ────────────────────────────────────────────────────────────────────

/// Writes device-resident frames back to a container file.
///
/// Frames are downloaded on the encode stream (the pipeline has already
/// inserted the cross-stream boundary) and appended in submission order.
pub struct RawFrameSink {
    writer: BufWriter<File>,
    coordinator: Arc<StreamCoordinator>,
    properties: VideoProperties,
    frames_written: u64,
    last_index: Option<u64>,
    path: PathBuf,
}

impl RawFrameSink {
    /// Create the output container with the source's properties.
    ///
    /// `total_frames` in the header stays zero until `flush()` patches it.
    pub fn create(
        path: &Path,
        properties: VideoProperties,
        coordinator: Arc<StreamCoordinator>,
    ) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| PipelineError::Sink(format!("{}: {e}", path.display())))?;
        let mut writer = BufWriter::with_capacity(4 * 1024 * 1024, file);
        writer
            .write_all(&encode_header(&properties, 0))
            .map_err(|e| PipelineError::Sink(format!("{}: header: {e}", path.display())))?;

        info!(path = %path.display(), "Frame sink opened");

        Ok(Self {
            writer,
            coordinator,
            properties,
            frames_written: 0,
            last_index: None,
            path: path.to_path_buf(),
        })
    }
}

impl FrameSink for RawFrameSink {
    fn submit(&mut self, frame: Frame) -> Result<()> {
        if frame.width != self.properties.width || frame.height != self.properties.height {
            return Err(PipelineError::Sink(format!(
                "frame {} is {}x{}, sink configured for {}x{}",
                frame.index,
                frame.width,
                frame.height,
                self.properties.width,
                self.properties.height
            )));
        }
        // Encoders require monotonic input order.
        if let Some(last) = self.last_index {
            if frame.index <= last {
                return Err(PipelineError::Sink(format!(
                    "out-of-order submission: frame {} after {}",
                    frame.index, last
                )));
            }
        }

        let pixels = self
            .coordinator
            .with_encode_stream(|stream| stream.download(&frame.data))?;
        self.writer
            .write_all(&pixels)
            .map_err(|e| PipelineError::Sink(format!("{}: {e}", self.path.display())))?;

        self.last_index = Some(frame.index);
        self.frames_written += 1;
        if self.frames_written % 100 == 0 {
            debug!(frames = self.frames_written, "Sink progress");
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| PipelineError::Sink(format!("{}: flush: {e}", self.path.display())))?;

        // Patch the frame count into the header so the output is re-openable.
        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(TOTAL_FRAMES_OFFSET))
            .map_err(|e| PipelineError::Sink(format!("{}: seek: {e}", self.path.display())))?;
        file.write_all(&self.frames_written.to_le_bytes())
            .map_err(|e| PipelineError::Sink(format!("{}: finalize: {e}", self.path.display())))?;
        file.seek(SeekFrom::End(0))
            .map_err(|e| PipelineError::Sink(format!("{}: seek: {e}", self.path.display())))?;

        info!(
            path = %self.path.display(),
            frames = self.frames_written,
            "Sink flushed — output finalised"
        );
        Ok(())
    }
}

// ─── Test pattern generator ──────────────────────────────────────────────────

/// Byte value every pixel of frame `index` is filled with.
#[inline]
pub fn pattern_byte(index: u64) -> u8 {
    (index % 251) as u8
}

/// Write a synthetic clip — every frame filled with [`pattern_byte`] of its
/// index — so the full pipeline can run without a real asset.
pub fn write_test_pattern(
    path: &Path,
    width: u32,
    height: u32,
    fps: f64,
    frames: u64,
) -> Result<()> {
    let props = VideoProperties {
        width,
        height,
        fps,
        total_frames: frames,
        format: PixelFormat::Rgb24,
    };
    let file = File::create(path)
        .map_err(|e| PipelineError::Sink(format!("{}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&encode_header(&props, frames))
        .map_err(|e| PipelineError::Sink(format!("{}: {e}", path.display())))?;
    for index in 0..frames {
        let frame = vec![pattern_byte(index); props.frame_bytes()];
        writer
            .write_all(&frame)
            .map_err(|e| PipelineError::Sink(format!("{}: {e}", path.display())))?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::Sink(format!("{}: {e}", path.display())))?;
    info!(path = %path.display(), frames, width, height, "Test pattern written");
    Ok(())
}
