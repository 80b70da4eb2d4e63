//! Device contracts, stream coordination, and frame types.

#[cfg(feature = "cuda")]
#[path = "device_cuda.rs"]
pub mod device;
#[cfg(not(feature = "cuda"))]
#[path = "device_stub.rs"]
pub mod device;

pub mod context;
pub mod types;
