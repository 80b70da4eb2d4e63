//! The per-frame control loop.
//!
//! # State machine
//!
//! ```text
//! Idle → SessionOpen → Running → {Draining, Cancelled, Failed} → Closed
//! ```
//!
//! One control thread drives the loop; concurrency exists only at the device
//! level via the session's stream pair.  Per iteration:
//!
//! pull (blocks until device-resident) → transform (identity by default) →
//! sink submit on the encode stream, behind a sync boundary → display render
//! (explicit device-to-host copy) → metric tick → cancellation poll.
//!
//! All three terminal triggers converge on the same cleanup: the session is
//! closed exactly once, the display is shut down exactly once, and metrics
//! are finalised and reported — a retained error is re-raised only after
//! cleanup completes.  Cleanup is never skipped to report an error sooner.
//!
//! # Cancellation skew
//!
//! Cancellation is polled cooperatively once per iteration.  A frame already
//! submitted to the sink when cancellation is observed is not retracted, so
//! the sink may hold one more frame than a failed render displayed.  This is
//! a deliberate policy, not an oversight.

use tracing::{debug, info, warn};

use crate::core::types::Frame;
use crate::engine::metrics::{MetricsRecorder, PipelineMetrics};
use crate::engine::session::VideoSession;
use crate::error::Result;
use crate::io::display::DisplaySurface;

/// Caller-supplied per-frame transform.  Pure with respect to the pipeline:
/// it may rewrite the frame in place but must not retain it.
pub type FrameTransform = Box<dyn FnMut(&mut Frame) -> Result<()> + Send>;

/// Driver lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    SessionOpen,
    Running,
    Draining,
    Cancelled,
    Failed,
    Closed,
}

enum Step {
    Continue,
    SourceExhausted,
    Cancelled,
}

/// Composes session, display, transform, and metrics into the frame loop.
pub struct PipelineDriver<D: DisplaySurface> {
    session: VideoSession,
    display: D,
    transform: Option<FrameTransform>,
    metrics: MetricsRecorder,
    state: DriverState,
}

impl<D: DisplaySurface> PipelineDriver<D> {
    /// Take ownership of an open session and a display surface.  Starts the
    /// metrics clock — elapsed time is measured open-to-close.
    pub fn new(session: VideoSession, display: D) -> Self {
        let mut metrics = MetricsRecorder::new();
        metrics.start();
        Self {
            session,
            display,
            transform: None,
            metrics,
            state: DriverState::SessionOpen,
        }
    }

    /// Install a per-frame transform (default is identity).
    pub fn with_transform(mut self, transform: FrameTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    #[inline]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// One loop iteration.  A `?` anywhere in here is the `Failed` path.
    fn step(&mut self) -> Result<Step> {
        let mut frame = match self.session.next_frame()? {
            Some(frame) => frame,
            None => return Ok(Step::SourceExhausted),
        };
        debug!(index = frame.index, "Frame pulled");

        if let Some(transform) = self.transform.as_mut() {
            transform(&mut frame)?;
        }

        // The display's CPU-visible copy is taken before the sink assumes
        // ownership of the device frame; submission still precedes render.
        let host_copy = self.session.download_for_display(&frame)?;

        if self.session.has_sink() {
            self.session.submit(frame)?;
        }

        self.display.render(&host_copy)?;
        self.metrics.tick();

        if self.display.poll_cancel() {
            return Ok(Step::Cancelled);
        }
        Ok(Step::Continue)
    }

    /// Run to completion, cancellation, or failure.
    ///
    /// Returns the final metrics; on failure the retained error is returned
    /// instead, after cleanup, with partial metrics already reported.
    pub fn run(mut self) -> Result<PipelineMetrics> {
        self.state = DriverState::Running;

        let outcome = loop {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::SourceExhausted) => {
                    self.state = DriverState::Draining;
                    debug!("Source exhausted — draining");
                    break Ok(());
                }
                Ok(Step::Cancelled) => {
                    self.state = DriverState::Cancelled;
                    info!(
                        frames = self.metrics.frames_processed(),
                        "Cancellation observed — stopping early"
                    );
                    break Ok(());
                }
                Err(e) => {
                    self.state = DriverState::Failed;
                    warn!(error = %e, "Frame loop failed — cleaning up before propagating");
                    break Err(e);
                }
            }
        };

        let close_result = self.session.close();
        self.display.shutdown();
        self.state = DriverState::Closed;

        let metrics = self.metrics.finish();
        metrics.report();

        outcome?;
        close_result?;
        Ok(metrics)
    }
}
