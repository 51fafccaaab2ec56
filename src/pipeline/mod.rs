//! Single-producer, multi-consumer frame hand-off
//!
//! The producer thread cycles through a fixed set of pre-allocated frame
//! slots: it pops the oldest slot from the ring, refills it in place and
//! pushes it back, then wakes every waiting consumer at once. Consumers
//! never take slots out of the ring; they copy whatever sits at the front
//! while holding the lock and write it out after releasing it.
//!
//! Delivery is lossy. A woken consumer sees *a* current frame, not
//! necessarily the one whose broadcast woke it, and a slow consumer simply
//! misses frames.

mod producer;
pub mod ring;
mod slot;

pub use producer::{FrameProducer, SLOW_FPS_THRESHOLD};
pub use ring::RingBuffer;
pub use slot::FrameSlot;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::debug;

/// An owned copy of one produced frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 1-based production counter of the slot contents
    pub sequence: u64,
    pub data: Bytes,
}

/// Pipeline counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Frames successfully written into a slot
    pub frames_produced: u64,

    /// Frames lost to codec failures
    pub frames_dropped: u64,
}

/// Slot storage plus the ring of slot indices
#[derive(Debug)]
struct FrameRing {
    slots: Vec<FrameSlot>,
    order: RingBuffer<usize>,
    next_sequence: u64,
}

pub struct FramePipeline {
    ring: Mutex<FrameRing>,
    frame_ready: Notify,
    shutdown: Notify,
    stop: AtomicBool,
    frames_produced: AtomicU64,
    frames_dropped: AtomicU64,
}

impl FramePipeline {
    /// Allocates `slots` frame buffers of `slot_capacity` bytes each.
    ///
    /// # Panics
    /// Panics if `slots` is zero.
    pub fn new(slots: usize, slot_capacity: usize) -> Self {
        let mut order = RingBuffer::new(slots);
        for index in 0..slots {
            order.push(index);
        }

        debug!(slots, slot_capacity, "Frame pipeline allocated");

        Self {
            ring: Mutex::new(FrameRing {
                slots: (0..slots)
                    .map(|_| FrameSlot::with_capacity(slot_capacity))
                    .collect(),
                order,
                next_sequence: 1,
            }),
            frame_ready: Notify::new(),
            shutdown: Notify::new(),
            stop: AtomicBool::new(false),
            frames_produced: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Number of frame slots
    pub fn capacity(&self) -> usize {
        self.ring.lock().order.capacity()
    }

    /// Refills the oldest slot through `fill` and wakes every consumer.
    ///
    /// Producer only. `fill` runs with the pipeline locked and receives the
    /// slot's buffer; it returns how many bytes of it are valid. Returns the
    /// sequence number given to the new frame. A failed fill is counted as
    /// a dropped frame and wakes nobody.
    pub fn produce_next<E, F>(&self, fill: F) -> Result<u64, E>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<usize, E>,
    {
        let mut ring = self.ring.lock();

        // Every slot index stays in the ring, so pop never comes up empty
        let index = ring.order.pop().unwrap_or_default();

        let sequence = ring.next_sequence;
        let result = ring.slots[index].fill(sequence, fill);
        ring.order.push(index);

        match result {
            Ok(_) => {
                ring.next_sequence += 1;
                self.frames_produced.fetch_add(1, Ordering::Relaxed);
                self.frame_ready.notify_waiters();
                Ok(sequence)
            }
            Err(e) => {
                self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Copies `jpeg` into the next slot
    pub fn publish(&self, jpeg: &[u8]) -> u64 {
        let result = self.produce_next(|buf| {
            buf.clear();
            buf.extend_from_slice(jpeg);
            Ok::<_, Infallible>(buf.len())
        });

        match result {
            Ok(sequence) => sequence,
            Err(never) => match never {},
        }
    }

    /// Waits for the next broadcast and returns a copy of the front frame.
    ///
    /// Returns `None` once the pipeline is stopped. Slots that have never
    /// been filled are skipped by waiting for another broadcast.
    pub async fn await_frame(&self) -> Option<Frame> {
        loop {
            let notified = self.frame_ready.notified();
            tokio::pin!(notified);
            // Register before the stop check so a concurrent shutdown can't be missed
            notified.as_mut().enable();

            if self.is_stopped() {
                return None;
            }

            notified.await;

            if self.is_stopped() {
                return None;
            }

            if let Some(frame) = self.current_frame() {
                return Some(frame);
            }
        }
    }

    /// Copy of the frame at the front of the ring, if it holds one
    pub fn current_frame(&self) -> Option<Frame> {
        let ring = self.ring.lock();
        let index = *ring.order.peek_front()?;
        let slot = &ring.slots[index];

        if slot.is_empty() {
            return None;
        }

        Some(Frame {
            sequence: slot.sequence(),
            data: Bytes::copy_from_slice(slot.bytes()),
        })
    }

    /// Sets the stop flag and wakes everything parked on the pipeline
    pub fn shutdown(&self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!("Frame pipeline stopping");
        self.frame_ready.notify_waiters();
        self.shutdown.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Resolves once `shutdown` has been called
    pub async fn stopped(&self) {
        loop {
            let notified = self.shutdown.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_stopped() {
                return;
            }

            notified.await;
        }
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_produced: self.frames_produced.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("stopped", &self.is_stopped())
            .field("stats", &self.stats())
            .finish()
    }
}
