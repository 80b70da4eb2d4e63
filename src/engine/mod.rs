//! Pipeline orchestration — session lifecycle, driver loop, metrics.

pub mod metrics;
pub mod pipeline;
pub mod session;
