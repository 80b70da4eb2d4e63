//! Contract tests for session lifecycle, driver loop, ordering, and
//! cancellation, using scripted in-memory collaborators.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use vidflow::codecs::{FrameSink, FrameSource};
use vidflow::core::context::StreamCoordinator;
use vidflow::core::types::{Frame, FrameRange, PixelFormat, StreamKind, VideoProperties};
use vidflow::engine::pipeline::{DriverState, PipelineDriver};
use vidflow::engine::session::{SinkFactory, SourceFactory, VideoSession};
use vidflow::error::{PipelineError, Result};
use vidflow::io::display::DisplaySurface;

// ─── Shared lifecycle log ────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn push(&self, event: &str) {
        self.0.lock().unwrap().push(event.to_string());
    }

    fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == event).count()
    }
}

// ─── Scripted source ─────────────────────────────────────────────────────────

const WIDTH: u32 = 4;
const HEIGHT: u32 = 2;

struct ScriptedSource {
    coordinator: Arc<StreamCoordinator>,
    range: FrameRange,
    cursor: u64,
    total_frames: u64,
    fail_at: Option<u64>,
    log: EventLog,
}

impl ScriptedSource {
    fn factory(total_frames: u64, fail_at: Option<u64>, log: EventLog) -> SourceFactory {
        Box::new(move |coordinator, range| {
            Ok(Box::new(ScriptedSource {
                coordinator,
                range,
                cursor: range.start,
                total_frames,
                fail_at,
                log,
            }) as Box<dyn FrameSource>)
        })
    }
}

impl FrameSource for ScriptedSource {
    fn properties(&self) -> VideoProperties {
        VideoProperties {
            width: WIDTH,
            height: HEIGHT,
            fps: 24.0,
            total_frames: self.total_frames,
            format: PixelFormat::Rgb24,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.cursor) {
            return Err(PipelineError::Source(format!(
                "scripted failure at frame {}",
                self.cursor
            )));
        }
        if self.cursor >= self.range.end.min(self.total_frames) {
            return Ok(None);
        }
        let pixels = vec![(self.cursor % 251) as u8; (WIDTH * HEIGHT * 3) as usize];
        let data = self
            .coordinator
            .with_decode_stream(|stream| stream.upload(&pixels))?;
        let frame = Frame {
            index: self.cursor,
            width: WIDTH,
            height: HEIGHT,
            format: PixelFormat::Rgb24,
            produced_on: StreamKind::Decode,
            data,
        };
        self.cursor += 1;
        Ok(Some(frame))
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.log.push("source_closed");
    }
}

// ─── Recording sink ──────────────────────────────────────────────────────────

struct RecordingSink {
    indices: Arc<Mutex<Vec<u64>>>,
    log: EventLog,
}

impl RecordingSink {
    fn factory(indices: Arc<Mutex<Vec<u64>>>, log: EventLog) -> SinkFactory {
        Box::new(move |_props, _coordinator| {
            log.push("sink_opened");
            Ok(Box::new(RecordingSink { indices, log }) as Box<dyn FrameSink>)
        })
    }
}

impl FrameSink for RecordingSink {
    fn submit(&mut self, frame: Frame) -> Result<()> {
        self.indices.lock().unwrap().push(frame.index);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.log.push("sink_flushed");
        Ok(())
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        self.log.push("sink_closed");
    }
}

// ─── Test display ────────────────────────────────────────────────────────────

#[derive(Default)]
struct DisplayState {
    rendered: Mutex<Vec<u64>>,
    shutdowns: AtomicU32,
}

struct TestDisplay {
    state: Arc<DisplayState>,
    /// Signal cancellation once the frame with this index has been rendered.
    cancel_after_index: Option<u64>,
    fail_render_at: Option<u64>,
}

impl TestDisplay {
    fn new(state: Arc<DisplayState>) -> Self {
        Self {
            state,
            cancel_after_index: None,
            fail_render_at: None,
        }
    }
}

impl DisplaySurface for TestDisplay {
    fn render(&mut self, frame: &vidflow::core::types::HostFrame) -> Result<()> {
        if self.fail_render_at == Some(frame.index) {
            return Err(PipelineError::Display(format!(
                "scripted render failure at frame {}",
                frame.index
            )));
        }
        self.state.rendered.lock().unwrap().push(frame.index);
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        match self.cancel_after_index {
            Some(index) => self.state.rendered.lock().unwrap().last() == Some(&index),
            None => false,
        }
    }

    fn shutdown(&mut self) {
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn coordinator() -> Arc<StreamCoordinator> {
    Arc::new(StreamCoordinator::new(0).expect("stream pair"))
}

fn open_session(
    coord: &Arc<StreamCoordinator>,
    range: FrameRange,
    total_frames: u64,
    sink: Option<SinkFactory>,
    log: &EventLog,
) -> Result<VideoSession> {
    VideoSession::open(
        coord.clone(),
        range,
        ScriptedSource::factory(total_frames, None, log.clone()),
        sink,
    )
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn full_range_without_sink_processes_every_frame() {
    let coord = coordinator();
    let log = EventLog::default();
    let session = open_session(&coord, FrameRange::new(0, 50), 100, None, &log).unwrap();
    let state = Arc::new(DisplayState::default());

    let metrics = PipelineDriver::new(session, TestDisplay::new(state.clone()))
        .run()
        .unwrap();

    assert_eq!(metrics.frames_processed, 50);
    assert!(metrics.fps > 0.0);
    // No sink configured — nothing was ever constructed or synchronized.
    assert_eq!(log.count("sink_opened"), 0);
    assert_eq!(coord.boundaries_inserted(), 0);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(log.count("source_closed"), 1);
}

#[test]
fn driver_starts_in_session_open_state() {
    let coord = coordinator();
    let log = EventLog::default();
    let session = open_session(&coord, FrameRange::new(0, 5), 100, None, &log).unwrap();
    let state = Arc::new(DisplayState::default());

    let driver = PipelineDriver::new(session, TestDisplay::new(state));
    assert_eq!(driver.state(), DriverState::SessionOpen);
    driver.run().unwrap();
}

#[test]
fn zero_length_range_processes_nothing() {
    let coord = coordinator();
    let log = EventLog::default();
    let session = open_session(&coord, FrameRange::new(0, 0), 100, None, &log).unwrap();
    let state = Arc::new(DisplayState::default());

    let metrics = PipelineDriver::new(session, TestDisplay::new(state.clone()))
        .run()
        .unwrap();

    assert_eq!(metrics.frames_processed, 0);
    assert_eq!(metrics.fps, 0.0);
    assert!(state.rendered.lock().unwrap().is_empty());
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn sink_receives_every_frame_in_increasing_order() {
    let coord = coordinator();
    let log = EventLog::default();
    let submitted = Arc::new(Mutex::new(Vec::new()));
    let session = open_session(
        &coord,
        FrameRange::new(0, 50),
        100,
        Some(RecordingSink::factory(submitted.clone(), log.clone())),
        &log,
    )
    .unwrap();
    let state = Arc::new(DisplayState::default());

    let metrics = PipelineDriver::new(session, TestDisplay::new(state.clone()))
        .run()
        .unwrap();

    let submitted = submitted.lock().unwrap();
    assert_eq!(metrics.frames_processed, 50);
    assert_eq!(submitted.len(), 50);
    assert!(submitted.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(*submitted, (0..50).collect::<Vec<_>>());
    assert_eq!(state.rendered.lock().unwrap().len(), submitted.len());
    // One decode→encode boundary per submission.
    assert_eq!(coord.boundaries_inserted(), 50);
    // Source released, sink flushed then released.
    assert_eq!(
        log.snapshot(),
        vec!["sink_opened", "source_closed", "sink_flushed", "sink_closed"]
    );
}

#[test]
fn cancellation_stops_after_current_frame_without_error() {
    let coord = coordinator();
    let log = EventLog::default();
    let submitted = Arc::new(Mutex::new(Vec::new()));
    let session = open_session(
        &coord,
        FrameRange::new(0, 50),
        100,
        Some(RecordingSink::factory(submitted.clone(), log.clone())),
        &log,
    )
    .unwrap();
    let state = Arc::new(DisplayState::default());
    let mut display = TestDisplay::new(state.clone());
    display.cancel_after_index = Some(10);

    let metrics = PipelineDriver::new(session, display).run().unwrap();

    // Cancel observed after frame 10 (0-indexed) — frame 10 still counts.
    assert_eq!(metrics.frames_processed, 11);
    // The already-submitted frame is not retracted.
    assert_eq!(submitted.lock().unwrap().len(), 11);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(log.count("source_closed"), 1);
    assert_eq!(log.count("sink_flushed"), 1);
}

#[test]
fn inverted_range_fails_at_open_before_any_pull() {
    let coord = coordinator();
    let log = EventLog::default();
    let err = open_session(&coord, FrameRange::new(40, 30), 100, None, &log).unwrap_err();
    assert!(matches!(err, PipelineError::Range { start: 40, end: 30, .. }));
    // The source that was opened to read properties is released again.
    assert_eq!(log.snapshot(), vec!["source_closed"]);
}

#[test]
fn range_start_past_source_bounds_is_rejected() {
    let coord = coordinator();
    let log = EventLog::default();
    let err = open_session(&coord, FrameRange::new(100, 110), 100, None, &log).unwrap_err();
    assert_eq!(err.error_code(), 100);
}

#[test]
fn close_is_idempotent() {
    let coord = coordinator();
    let log = EventLog::default();
    let submitted = Arc::new(Mutex::new(Vec::new()));
    let mut session = open_session(
        &coord,
        FrameRange::new(0, 10),
        100,
        Some(RecordingSink::factory(submitted, log.clone())),
        &log,
    )
    .unwrap();

    session.close().unwrap();
    session.close().unwrap();

    assert_eq!(log.count("source_closed"), 1);
    assert_eq!(log.count("sink_closed"), 1);
    assert_eq!(log.count("sink_flushed"), 1);
}

#[test]
fn sink_open_failure_still_closes_source_first() {
    let coord = coordinator();
    let log = EventLog::default();
    let failing_sink: SinkFactory = {
        let log = log.clone();
        Box::new(move |_props, _coordinator| {
            log.push("sink_open_failed");
            Err(PipelineError::Sink("cannot create output".into()))
        })
    };

    let err = open_session(&coord, FrameRange::new(0, 10), 100, Some(failing_sink), &log)
        .unwrap_err();

    assert!(matches!(err, PipelineError::Sink(_)));
    assert_eq!(log.snapshot(), vec!["sink_open_failed", "source_closed"]);
}

#[test]
fn midstream_source_failure_cleans_up_then_propagates() {
    let coord = coordinator();
    let log = EventLog::default();
    let submitted = Arc::new(Mutex::new(Vec::new()));
    let session = VideoSession::open(
        coord.clone(),
        FrameRange::new(0, 50),
        ScriptedSource::factory(100, Some(5), log.clone()),
        Some(RecordingSink::factory(submitted.clone(), log.clone())),
    )
    .unwrap();
    let state = Arc::new(DisplayState::default());

    let err = PipelineDriver::new(session, TestDisplay::new(state.clone()))
        .run()
        .unwrap_err();

    assert!(matches!(err, PipelineError::Source(_)));
    // Frames 0..5 made it through before the failure.
    assert_eq!(submitted.lock().unwrap().len(), 5);
    // Cleanup ran in full despite the error.
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(log.count("source_closed"), 1);
    assert_eq!(log.count("sink_flushed"), 1);
    assert_eq!(log.count("sink_closed"), 1);
}

#[test]
fn display_failure_cleans_up_then_propagates() {
    let coord = coordinator();
    let log = EventLog::default();
    let session = open_session(&coord, FrameRange::new(0, 50), 100, None, &log).unwrap();
    let state = Arc::new(DisplayState::default());
    let mut display = TestDisplay::new(state.clone());
    display.fail_render_at = Some(3);

    let err = PipelineDriver::new(session, display).run().unwrap_err();

    assert!(matches!(err, PipelineError::Display(_)));
    assert_eq!(state.rendered.lock().unwrap().len(), 3);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(log.count("source_closed"), 1);
}

#[test]
fn transform_failure_cleans_up_then_propagates() {
    let coord = coordinator();
    let log = EventLog::default();
    let session = open_session(&coord, FrameRange::new(0, 50), 100, None, &log).unwrap();
    let state = Arc::new(DisplayState::default());

    let err = PipelineDriver::new(session, TestDisplay::new(state.clone()))
        .with_transform(Box::new(|frame| {
            if frame.index == 7 {
                Err(PipelineError::Transform("scripted transform failure".into()))
            } else {
                Ok(())
            }
        }))
        .run()
        .unwrap_err();

    assert!(matches!(err, PipelineError::Transform(_)));
    assert_eq!(state.rendered.lock().unwrap().len(), 7);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(log.count("source_closed"), 1);
}

#[test]
fn source_shorter_than_range_yields_what_exists() {
    let coord = coordinator();
    let log = EventLog::default();
    let session = open_session(&coord, FrameRange::new(0, 50), 5, None, &log).unwrap();
    let state = Arc::new(DisplayState::default());

    let metrics = PipelineDriver::new(session, TestDisplay::new(state))
        .run()
        .unwrap();

    assert_eq!(metrics.frames_processed, 5);
}

#[test]
fn frames_are_displayed_in_increasing_source_order() {
    let coord = coordinator();
    let log = EventLog::default();
    let session = open_session(&coord, FrameRange::new(10, 30), 100, None, &log).unwrap();
    let state = Arc::new(DisplayState::default());

    PipelineDriver::new(session, TestDisplay::new(state.clone()))
        .run()
        .unwrap();

    let rendered = state.rendered.lock().unwrap();
    assert_eq!(*rendered, (10..30).collect::<Vec<_>>());
}
