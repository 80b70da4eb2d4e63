//! CUDA device backend via `cudarc` (feature `cuda`).
//!
//! Streams map to CUDA streams forked from the device's default stream.
//! Cross-stream ordering uses driver events: the coordinator records an
//! event on the producing stream and issues `cuStreamWaitEvent` on the
//! consuming stream, so the host never blocks at the handoff.
//!
//! Host transfers (`upload`/`download`) use cudarc's synchronous copies —
//! the pull side is allowed to block until a frame is resident, and the
//! display-side download is an explicit, observable transfer.

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use cudarc::driver::{CudaDevice, CudaSlice, CudaStream};
use tracing::debug;

use crate::error::{PipelineError, Result};

// ─── Driver API surface for events ──────────────────────────────────────────

pub type CUstream = *mut c_void;
pub type CUevent = *mut c_void;
pub type CUresult = i32;

const CU_EVENT_DISABLE_TIMING: u32 = 0x2;

extern "C" {
    fn cuEventCreate(event: *mut CUevent, flags: u32) -> CUresult;
    fn cuEventRecord(event: CUevent, stream: CUstream) -> CUresult;
    fn cuStreamWaitEvent(stream: CUstream, event: CUevent, flags: u32) -> CUresult;
    fn cuEventDestroy_v2(event: CUevent) -> CUresult;
}

fn check_cu(rc: CUresult, what: &str) -> Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(PipelineError::Device(format!("{what} failed: CUresult {rc}")))
    }
}

#[inline]
fn get_raw_stream(stream: &CudaStream) -> CUstream {
    stream.stream as CUstream
}

// ─── Device handle ───────────────────────────────────────────────────────────

/// CUDA device handle.
#[derive(Clone)]
pub struct DeviceHandle {
    device: Arc<CudaDevice>,
    ordinal: usize,
}

impl DeviceHandle {
    pub fn new(ordinal: usize) -> Result<Self> {
        let device = CudaDevice::new(ordinal)
            .map_err(|e| PipelineError::Device(format!("CUDA device {ordinal}: {e}")))?;
        debug!(ordinal, "CUDA device backend active");
        Ok(Self { device, ordinal })
    }

    #[inline]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Allocate an independent CUDA stream.
    pub fn create_stream(&self) -> Result<DeviceStream> {
        let stream = self
            .device
            .fork_default_stream()
            .map_err(|e| PipelineError::Device(format!("stream creation: {e}")))?;
        Ok(DeviceStream {
            stream,
            device: self.device.clone(),
        })
    }
}

// ─── Stream ──────────────────────────────────────────────────────────────────

/// An independent, ordered CUDA execution queue.
pub struct DeviceStream {
    stream: CudaStream,
    device: Arc<CudaDevice>,
}

impl DeviceStream {
    /// Copy host bytes into a fresh device allocation.
    pub fn upload(&self, host: &[u8]) -> Result<DeviceBuffer> {
        let slice = self
            .device
            .htod_sync_copy(host)
            .map_err(|e| PipelineError::Device(format!("host-to-device copy: {e}")))?;
        Ok(DeviceBuffer { slice })
    }

    /// Explicit device-to-host transfer.  Blocks until the copy completes.
    pub fn download(&self, buf: &DeviceBuffer) -> Result<Vec<u8>> {
        self.device
            .dtoh_sync_copy(&buf.slice)
            .map_err(|e| PipelineError::Device(format!("device-to-host copy: {e}")))
    }

    /// Record an ordering event at the stream's current position.
    pub fn record_event(&self) -> Result<DeviceEvent> {
        let mut event: CUevent = ptr::null_mut();
        // SAFETY: cuEventCreate writes to `event`.  Timing is disabled — we
        // only need ordering semantics.
        unsafe {
            check_cu(cuEventCreate(&mut event, CU_EVENT_DISABLE_TIMING), "cuEventCreate")?;
            check_cu(cuEventRecord(event, get_raw_stream(&self.stream)), "cuEventRecord")?;
        }
        Ok(DeviceEvent { event })
    }

    /// Make this stream wait for `event` before executing later work.
    /// Device-side wait — the host does not block.
    pub fn wait_event(&self, event: &DeviceEvent) -> Result<()> {
        // SAFETY: stream/event handles are produced by driver-backed APIs.
        unsafe {
            check_cu(
                cuStreamWaitEvent(get_raw_stream(&self.stream), event.event, 0),
                "cuStreamWaitEvent",
            )
        }
    }

    /// Block the host until all enqueued work completes.
    pub fn synchronize(&self) -> Result<()> {
        self.stream
            .synchronize()
            .map_err(|e| PipelineError::Device(format!("stream synchronize: {e}")))
    }
}

// ─── Buffer and event ────────────────────────────────────────────────────────

/// Device memory allocation holding packed pixel data.
pub struct DeviceBuffer {
    slice: CudaSlice<u8>,
}

impl DeviceBuffer {
    #[inline]
    pub fn len(&self) -> usize {
        self.slice.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slice.len() == 0
    }
}

/// Ordering marker recorded on a stream.
pub struct DeviceEvent {
    event: CUevent,
}

// SAFETY: CUevent is a driver handle with no thread affinity.
unsafe impl Send for DeviceEvent {}

impl Drop for DeviceEvent {
    fn drop(&mut self) {
        // SAFETY: event was created by cuEventCreate; destruction is
        // deferred by the driver until pending waits complete.
        unsafe {
            cuEventDestroy_v2(self.event);
        }
    }
}
