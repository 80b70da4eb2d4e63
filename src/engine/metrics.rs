//! Throughput accounting — processed-frame count and elapsed wall time.

use std::time::Instant;

use serde::Serialize;
use tracing::info;

/// Final run summary.  `fps` is derived; zero-elapsed runs report 0 rather
/// than dividing by zero.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct PipelineMetrics {
    pub frames_processed: u64,
    pub elapsed_seconds: f64,
    pub fps: f64,
}

impl PipelineMetrics {
    /// Emit the summary through tracing.  Also used for partial metrics on
    /// failure — partial throughput is still diagnostic information.
    pub fn report(&self) {
        info!(
            frames = self.frames_processed,
            elapsed_s = format!("{:.3}", self.elapsed_seconds),
            fps = format!("{:.2}", self.fps),
            "Throughput summary"
        );
    }
}

/// Accumulates frame ticks between a monotonic start and finish timestamp.
pub struct MetricsRecorder {
    started_at: Option<Instant>,
    frames_processed: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            started_at: None,
            frames_processed: 0,
        }
    }

    /// Record the session-open timestamp.
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Count one successfully displayed/submitted frame.
    #[inline]
    pub fn tick(&mut self) {
        self.frames_processed += 1;
    }

    #[inline]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Record the session-close timestamp and derive the summary.
    pub fn finish(&self) -> PipelineMetrics {
        let elapsed_seconds = self
            .started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let fps = if elapsed_seconds > 0.0 {
            self.frames_processed as f64 / elapsed_seconds
        } else {
            0.0
        };
        PipelineMetrics {
            frames_processed: self.frames_processed,
            elapsed_seconds,
            fps,
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
