//! Stream coordination — two independent device execution streams and the
//! synchronization points between them.
//!
//! Decode/display and encode are independent producer/consumer pairs.
//! Running them on separate streams lets the device overlap encode
//! submission of frame *N* with decode of frame *N+1*; a single shared
//! stream would serialize the two and defeat the throughput goal.
//!
//! Ordering contract: work enqueued on one stream never implicitly blocks
//! the other.  Wherever a frame crosses from one stream's producer to the
//! other stream's consumer, [`StreamCoordinator::sync_boundary`] inserts the
//! minimal device-side sync (event record on the producer, event wait on the
//! consumer).  Display consumes on the decode stream and needs no boundary.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::core::device::{DeviceHandle, DeviceStream};
use crate::core::types::{Frame, StreamKind};
use crate::error::Result;

/// Owns the decode and encode streams for one session.
///
/// If either stream fails to allocate, construction fails as a whole — no
/// partial stream state is retained (the successfully created stream is
/// released by drop before the error propagates).
pub struct StreamCoordinator {
    device: DeviceHandle,
    decode: DeviceStream,
    encode: DeviceStream,
    /// Cross-stream sync points inserted so far.  Advisory, for tests and
    /// diagnostics.
    boundaries: AtomicU64,
}

impl StreamCoordinator {
    /// Allocate both streams on the given device ordinal.
    pub fn new(device_ordinal: usize) -> Result<Self> {
        let device = DeviceHandle::new(device_ordinal)?;
        let decode = device.create_stream()?;
        let encode = device.create_stream()?;
        debug!(device_ordinal, "stream pair allocated");
        Ok(Self {
            device,
            decode,
            encode,
            boundaries: AtomicU64::new(0),
        })
    }

    #[inline]
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Run `f` with the decode/display stream.
    pub fn with_decode_stream<T>(&self, f: impl FnOnce(&DeviceStream) -> Result<T>) -> Result<T> {
        f(&self.decode)
    }

    /// Run `f` with the encode submission stream.
    pub fn with_encode_stream<T>(&self, f: impl FnOnce(&DeviceStream) -> Result<T>) -> Result<T> {
        f(&self.encode)
    }

    /// Insert the minimal sync needed before `frame` is consumed on the
    /// opposite stream from the one that produced it.
    ///
    /// Called once per sink submission, before the consumer touches the
    /// frame's device memory.  The wait is device-side; the host never
    /// blocks here.
    pub fn sync_boundary(&self, frame: &Frame) -> Result<()> {
        let (producer, consumer) = match frame.produced_on {
            StreamKind::Decode => (&self.decode, &self.encode),
            StreamKind::Encode => (&self.encode, &self.decode),
        };
        let event = producer.record_event()?;
        consumer.wait_event(&event)?;
        self.boundaries.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Number of cross-stream boundaries inserted so far.
    #[inline]
    pub fn boundaries_inserted(&self) -> u64 {
        self.boundaries.load(Ordering::Relaxed)
    }

    /// Block until both streams drain.  Used at session close so no device
    /// work outlives the resources it references.
    pub fn sync_all(&self) -> Result<()> {
        self.decode.synchronize()?;
        self.encode.synchronize()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Frame, PixelFormat, StreamKind};

    fn decode_frame(coordinator: &StreamCoordinator, index: u64) -> Frame {
        let data = coordinator
            .with_decode_stream(|s| s.upload(&[0u8; 12]))
            .unwrap();
        Frame {
            index,
            width: 2,
            height: 2,
            format: PixelFormat::Rgb24,
            produced_on: StreamKind::Decode,
            data,
        }
    }

    #[test]
    fn sync_boundary_counts_handoffs() {
        let coordinator = StreamCoordinator::new(0).unwrap();
        assert_eq!(coordinator.boundaries_inserted(), 0);
        let frame = decode_frame(&coordinator, 0);
        coordinator.sync_boundary(&frame).unwrap();
        coordinator.sync_boundary(&frame).unwrap();
        assert_eq!(coordinator.boundaries_inserted(), 2);
    }

    #[test]
    fn sync_all_is_clean_on_idle_streams() {
        let coordinator = StreamCoordinator::new(0).unwrap();
        coordinator.sync_all().unwrap();
    }

    #[test]
    fn coordinator_exposes_its_device() {
        let coordinator = StreamCoordinator::new(0).unwrap();
        assert_eq!(coordinator.device().ordinal(), 0);
    }
}
