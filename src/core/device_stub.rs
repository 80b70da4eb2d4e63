//! Portable host-memory device backend.
//!
//! Default build target: the same API surface as the CUDA backend
//! (`device_cuda.rs`), backed by host allocations with synchronous copies.
//! "Streams" here are ordered trivially — the whole backend executes inline
//! on the calling thread — but event record/wait bookkeeping is kept so the
//! coordinator's synchronization contract is exercised identically in tests
//! and on machines without a GPU.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;

/// Per-stream bookkeeping shared between a stream and the events it records.
struct StreamState {
    id: u64,
    /// Operations enqueued on this stream (uploads, downloads, waits).
    ops: AtomicU64,
}

/// Opaque device handle.  The stub accepts any ordinal.
#[derive(Clone)]
pub struct DeviceHandle {
    ordinal: usize,
    next_stream_id: Arc<AtomicU64>,
}

impl DeviceHandle {
    pub fn new(ordinal: usize) -> Result<Self> {
        debug!(ordinal, "host-memory device backend active (built without `cuda`)");
        Ok(Self {
            ordinal,
            next_stream_id: Arc::new(AtomicU64::new(0)),
        })
    }

    #[inline]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Allocate an independent execution stream.
    pub fn create_stream(&self) -> Result<DeviceStream> {
        let id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        Ok(DeviceStream {
            state: Arc::new(StreamState {
                id,
                ops: AtomicU64::new(0),
            }),
        })
    }
}

/// An ordered execution queue.  Stub operations complete inline.
pub struct DeviceStream {
    state: Arc<StreamState>,
}

impl DeviceStream {
    /// Copy host bytes into a fresh device allocation on this stream.
    pub fn upload(&self, host: &[u8]) -> Result<DeviceBuffer> {
        self.state.ops.fetch_add(1, Ordering::Relaxed);
        Ok(DeviceBuffer {
            bytes: host.to_vec(),
        })
    }

    /// Explicit device-to-host transfer.  Blocks until the copy completes
    /// (trivially, for the stub).
    pub fn download(&self, buf: &DeviceBuffer) -> Result<Vec<u8>> {
        self.state.ops.fetch_add(1, Ordering::Relaxed);
        Ok(buf.bytes.clone())
    }

    /// Record an ordering marker at the stream's current position.
    pub fn record_event(&self) -> Result<DeviceEvent> {
        Ok(DeviceEvent {
            stream_id: self.state.id,
            at_op: self.state.ops.load(Ordering::Relaxed),
        })
    }

    /// Make this stream wait for `event` before executing later work.
    pub fn wait_event(&self, event: &DeviceEvent) -> Result<()> {
        // Inline execution means the producer already finished; only the
        // bookkeeping matters here.
        let _ = event;
        self.state.ops.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Block until all enqueued work completes.
    pub fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}

/// Device memory allocation holding packed pixel data.
pub struct DeviceBuffer {
    bytes: Vec<u8>,
}

impl DeviceBuffer {
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Ordering marker recorded on a stream.
pub struct DeviceEvent {
    #[allow(dead_code)]
    stream_id: u64,
    #[allow(dead_code)]
    at_op: u64,
}
