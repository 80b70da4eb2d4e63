//! vidflow — GPU-resident frame pipeline with display/encode fan-out.
//!
//! # Architecture
//!
//! Frames stay device-resident end to end; the only host copy is the
//! explicit download a host-memory display requires:
//!
//! ```text
//! FrameSource ──(decode stream)──▸ transform ──┬──▸ FrameSink (encode stream)
//!                                              └──▸ DisplaySurface (host copy)
//! ```
//!
//! Decode/display and encode run on two independent device streams so the
//! device can overlap encode of frame *N* with decode of frame *N+1*; the
//! coordinator inserts an event-based sync boundary at every decode→encode
//! frame handoff.
//!
//! # Module layout
//!
//! - [`core`] — device backend (CUDA or portable stub), stream coordination,
//!   frame types
//! - [`codecs`] — source/sink traits and the bundled raw frame container
//! - [`engine`] — session lifecycle, driver loop, metrics
//! - [`io`] — display surfaces and sample-asset fetching
//! - [`error`] — typed error hierarchy

pub mod codecs;
pub mod core;
pub mod engine;
pub mod error;
pub mod io;
