//! Scoped acquisition of a frame source (and optional sink) bound to a
//! frame range.
//!
//! The session pairs every acquire with a release: no code path between a
//! successful `open` and the matching `close` can skip `close`, including
//! partial-open failure (a sink that fails to open still releases the
//! already-opened source first).  `close()` is idempotent and also runs from
//! `Drop` as a backstop, so device and file resources are released exactly
//! once on every exit path.
//!
//! Release order on close: source, then sink (flushed first), then the
//! stream pair is drained.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codecs::{FrameSink, FrameSource};
use crate::core::context::StreamCoordinator;
use crate::core::types::{Frame, FrameRange, HostFrame, VideoProperties};
use crate::error::{PipelineError, Result};

/// Constructs the frame source.  Receives the coordinator (for decode-stream
/// uploads) and the range the source must apply.
pub type SourceFactory =
    Box<dyn FnOnce(Arc<StreamCoordinator>, FrameRange) -> Result<Box<dyn FrameSource>>>;

/// Constructs the frame sink, configured identically to the source's
/// properties.  Only invoked when output was requested.
pub type SinkFactory =
    Box<dyn FnOnce(VideoProperties, Arc<StreamCoordinator>) -> Result<Box<dyn FrameSink>>>;

/// A live source/sink pair bound to a frame range and a stream pair.
pub struct VideoSession {
    coordinator: Arc<StreamCoordinator>,
    source: Option<Box<dyn FrameSource>>,
    sink: Option<Box<dyn FrameSink>>,
    range: FrameRange,
    properties: VideoProperties,
    closed: bool,
}

impl std::fmt::Debug for VideoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSession")
            .field("range", &self.range)
            .field("properties", &self.properties)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl VideoSession {
    /// Open the source, validate the range against its properties, then open
    /// the sink if requested.
    ///
    /// Fails fast: errors here never enter the running state.  If the sink
    /// factory fails after the source opened, the source is released before
    /// the sink error propagates.
    pub fn open(
        coordinator: Arc<StreamCoordinator>,
        range: FrameRange,
        source_factory: SourceFactory,
        sink_factory: Option<SinkFactory>,
    ) -> Result<Self> {
        let source = source_factory(coordinator.clone(), range)?;
        let properties = source.properties();

        if let Err(e) = range.validate(properties.total_frames) {
            drop(source);
            return Err(e);
        }

        let sink = match sink_factory {
            Some(factory) => match factory(properties, coordinator.clone()) {
                Ok(sink) => Some(sink),
                Err(e) => {
                    // Source released before the sink error propagates.
                    drop(source);
                    return Err(e);
                }
            },
            None => None,
        };

        info!(
            start = range.start,
            end = range.end,
            total_frames = properties.total_frames,
            sink = sink.is_some(),
            "Session opened"
        );

        Ok(Self {
            coordinator,
            source: Some(source),
            sink,
            range,
            properties,
            closed: false,
        })
    }

    #[inline]
    pub fn properties(&self) -> VideoProperties {
        self.properties
    }

    #[inline]
    pub fn range(&self) -> FrameRange {
        self.range
    }

    #[inline]
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    #[inline]
    pub fn coordinator(&self) -> &Arc<StreamCoordinator> {
        &self.coordinator
    }

    /// Pull the next frame in range, blocking until it is device-resident.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.source.as_mut() {
            Some(source) => source.next_frame(),
            None => Err(PipelineError::Source("session is closed".into())),
        }
    }

    /// Produce the explicit CPU-visible copy a host-memory display consumes.
    ///
    /// The transfer runs on the decode stream — the same stream that
    /// produced the frame — so no cross-stream boundary is needed.
    pub fn download_for_display(&self, frame: &Frame) -> Result<HostFrame> {
        let data = self
            .coordinator
            .with_decode_stream(|stream| stream.download(&frame.data))?;
        Ok(HostFrame {
            index: frame.index,
            width: frame.width,
            height: frame.height,
            format: frame.format,
            data,
        })
    }

    /// Hand a frame to the sink on the encode stream.
    ///
    /// Inserts the decode→encode sync boundary first, then transfers
    /// ownership of the frame to the sink.
    pub fn submit(&mut self, frame: Frame) -> Result<()> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| PipelineError::Sink("no sink configured".into()))?;
        self.coordinator.sync_boundary(&frame)?;
        sink.submit(frame)
    }

    /// Release everything the session acquired.  Idempotent.
    ///
    /// Runs to completion even when an intermediate release fails; the first
    /// failure is returned after all releases were attempted.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_err: Option<PipelineError> = None;

        // Source first.
        self.source = None;

        // Sink flushed, then released.
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.flush() {
                warn!(error = %e, "Sink flush failed during close");
                first_err.get_or_insert(e);
            }
        }

        // Stream handles last — nothing may still be enqueued against the
        // resources released above.
        if let Err(e) = self.coordinator.sync_all() {
            first_err.get_or_insert(e);
        }

        debug!("Session closed");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for VideoSession {
    fn drop(&mut self) {
        if !self.closed {
            debug!("Session dropped without explicit close — releasing now");
            let _ = self.close();
        }
    }
}
