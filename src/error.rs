//! Typed error hierarchy for the pipeline.
//!
//! Uses `thiserror` for library-grade errors.  Each variant maps to a stable
//! integer code via [`PipelineError::error_code`] so the CLI can exit with a
//! structured status without string parsing.
//!
//! Cancellation is deliberately NOT an error: a cancelled run returns `Ok`
//! with partial metrics.

/// All errors originating from the vidflow pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    // ── Session open ──────────────────────────────────────────────────
    /// Invalid frame range for the opened source.
    #[error("invalid frame range [{start}, {end}) for source with {total_frames} frames")]
    Range {
        start: u64,
        end: u64,
        total_frames: u64,
    },

    /// Device or stream allocation failure.
    #[error("device error: {0}")]
    Device(String),

    /// Source/sink property mismatch or unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    // ── Mid-stream ────────────────────────────────────────────────────
    /// Frame source (decoder) failure.
    #[error("source error: {0}")]
    Source(String),

    /// Frame sink (encoder) failure.
    #[error("sink error: {0}")]
    Sink(String),

    /// Display render failure.
    #[error("display error: {0}")]
    Display(String),

    /// Caller-supplied transform failure.
    #[error("transform error: {0}")]
    Transform(String),

    // ── Outside the session ───────────────────────────────────────────
    /// Asset download failure.  Fatal, never retried at this layer.
    #[error("fetch error: {0}")]
    Fetch(String),
}

impl PipelineError {
    /// Stable integer error code for structured telemetry and exit status.
    ///
    /// Codes are grouped by category:
    /// - 1xx: session open (range/device/config)
    /// - 2xx: mid-stream (source/sink/display/transform)
    /// - 3xx: asset fetch
    pub fn error_code(&self) -> u32 {
        match self {
            Self::Range { .. } => 100,
            Self::Device(_) => 101,
            Self::Config(_) => 102,
            Self::Source(_) => 200,
            Self::Sink(_) => 201,
            Self::Display(_) => 202,
            Self::Transform(_) => 203,
            Self::Fetch(_) => 300,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
