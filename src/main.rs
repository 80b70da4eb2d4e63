//! vidflow CLI entrypoint.
//!
//! Streams a bounded range of frames through the device pipeline, rendering
//! to a display surface and optionally persisting to an output container,
//! then reports throughput.
//!
//! ```bash
//! vidflow --synth-frames 300 --input clip.fvr --start 0 --end 50
//! vidflow --input clip.fvr --save-output -o processed.fvr --json
//! vidflow --input clip.fvr --probe
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use vidflow::codecs::raw::{self, RawFrameSink, RawFrameSource};
use vidflow::codecs::{FrameSink, FrameSource};
use vidflow::core::context::StreamCoordinator;
use vidflow::core::types::FrameRange;
use vidflow::engine::pipeline::PipelineDriver;
use vidflow::engine::session::{SinkFactory, VideoSession};
use vidflow::error::{PipelineError, Result};
use vidflow::io::display::{DisplaySurface, NullDisplay};
use vidflow::io::fetch;

// ─── CLI argument definition ─────────────────────────────────────────────────

/// Sample assets from the Google test-video bucket.  These are MP4s: opening
/// them needs an external decoder implementation, so default builds pair the
/// fetch with `--synth-frames` or a `.fvr` input instead.
const LITE_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerBlazes.mp4";
const FULL_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AssetMode {
    /// Small clip, suitable for CI.
    Lite,
    /// Big Buck Bunny, for local runs.
    Full,
}

impl AssetMode {
    fn url_and_name(self) -> (&'static str, &'static str) {
        match self {
            Self::Lite => (LITE_URL, "ForBiggerBlazes.mp4"),
            Self::Full => (FULL_URL, "BigBuckBunny.mp4"),
        }
    }
}

/// GPU-resident frame pipeline benchmark.
#[derive(Parser, Debug)]
#[command(name = "vidflow", version, about)]
struct Cli {
    /// Input container path.  When omitted, the sample asset selected by
    /// --mode is fetched into the working directory and used instead.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Sample asset variant fetched when no --input is given.
    #[arg(long = "mode", value_enum, default_value_t = AssetMode::Lite)]
    mode: AssetMode,

    /// First frame index of the half-open range.
    #[arg(long = "start", default_value_t = 0)]
    start: u64,

    /// One past the last frame index.
    #[arg(long = "end", default_value_t = 50)]
    end: u64,

    /// Persist processed frames to the output container.
    #[arg(long = "save-output")]
    save_output: bool,

    /// Output container path.
    #[arg(short = 'o', long = "output", default_value = "output.fvr")]
    output: PathBuf,

    /// Device ordinal (0-indexed).
    #[arg(short = 'd', long = "device", default_value_t = 0)]
    device: usize,

    /// Generate a synthetic test clip at the input path before running.
    #[arg(long = "synth-frames")]
    synth_frames: Option<u64>,

    /// Synthetic clip width.
    #[arg(long = "synth-width", default_value_t = 320)]
    synth_width: u32,

    /// Synthetic clip height.
    #[arg(long = "synth-height", default_value_t = 180)]
    synth_height: u32,

    /// Synthetic clip framerate.
    #[arg(long = "synth-fps", default_value_t = 24.0)]
    synth_fps: f64,

    /// Print the source's properties and exit.
    #[arg(long = "probe")]
    probe: bool,

    /// Run without a window even when built with the `display` feature.
    #[arg(long = "headless")]
    headless: bool,

    /// Default log level (overridden by RUST_LOG).
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    /// Emit the metrics summary as JSON on stdout.
    #[arg(long = "json")]
    json: bool,
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Process-wide logging configuration, set once, never mutated after.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    match rt.block_on(run(cli)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), "Run failed");
            std::process::exit(e.error_code() as i32);
        }
    }
}

// ─── Pipeline wiring ─────────────────────────────────────────────────────────

async fn run(cli: Cli) -> Result<()> {
    // ── 1. Resolve the input asset ──
    let input = match cli.input.clone() {
        Some(path) => path,
        None => {
            let (url, name) = cli.mode.url_and_name();
            let path = PathBuf::from(name);
            fetch::ensure_local(url, &path).await?;
            path
        }
    };

    if let Some(frames) = cli.synth_frames {
        raw::write_test_pattern(&input, cli.synth_width, cli.synth_height, cli.synth_fps, frames)?;
    }

    // ── 2. Metadata-only probe ──
    if cli.probe {
        let props = raw::probe(&input)?;
        println!(
            "{}",
            serde_json::json!({
                "width": props.width,
                "height": props.height,
                "fps": props.fps,
                "total_frames": props.total_frames,
            })
        );
        return Ok(());
    }

    // ── 3. Streams, session, display ──
    let coordinator = Arc::new(StreamCoordinator::new(cli.device)?);
    let range = FrameRange::new(cli.start, cli.end);

    let source_path = input.clone();
    let sink_factory: Option<SinkFactory> = if cli.save_output {
        let output = cli.output.clone();
        Some(Box::new(move |props, coordinator| {
            RawFrameSink::create(&output, props, coordinator)
                .map(|sink| Box::new(sink) as Box<dyn FrameSink>)
        }))
    } else {
        None
    };

    let session = VideoSession::open(
        coordinator,
        range,
        Box::new(move |coordinator, range| {
            RawFrameSource::open(&source_path, coordinator, range)
                .map(|source| Box::new(source) as Box<dyn FrameSource>)
        }),
        sink_factory,
    )?;

    let display = make_display(&session, cli.headless)?;

    // ── 4. Run and report ──
    let metrics = PipelineDriver::new(session, display).run()?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&metrics)
                .map_err(|e| PipelineError::Config(format!("metrics serialization: {e}")))?
        );
    }
    Ok(())
}

#[cfg(feature = "display")]
fn make_display(
    session: &VideoSession,
    headless: bool,
) -> Result<Box<dyn DisplaySurface>> {
    if headless {
        Ok(Box::new(NullDisplay::new()))
    } else {
        let props = session.properties();
        Ok(Box::new(vidflow::io::display::Sdl2Display::new(
            props.width,
            props.height,
        )?))
    }
}

#[cfg(not(feature = "display"))]
fn make_display(
    _session: &VideoSession,
    _headless: bool,
) -> Result<Box<dyn DisplaySurface>> {
    Ok(Box::new(NullDisplay::new()))
}
