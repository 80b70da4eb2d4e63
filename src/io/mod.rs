//! External-facing I/O — display surfaces and sample-asset fetching.

pub mod display;
pub mod fetch;
