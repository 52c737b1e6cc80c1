//! Bounded hand-off between the capture callback and the control loop

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use super::AudioFrame;

/// Default capacity in frames (~32 seconds of 0.5s blocks)
pub const DEFAULT_CAPACITY: usize = 64;

/// Thread-safe FIFO of audio frames
///
/// `push` never blocks: when the queue is full the oldest frame is evicted
/// so the audio callback cannot stall. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    tx: Sender<AudioFrame>,
    rx: Receiver<AudioFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameBuffer {
    /// Create a buffer holding at most `capacity` frames
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue a frame, evicting the oldest one if the queue is full
    pub fn push(&self, frame: AudioFrame) {
        let mut frame = frame;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if self.rx.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    frame = rejected;
                }
                // Both halves live in `self`, so the channel cannot disconnect
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Wait up to `timeout` for the next frame
    ///
    /// Returns `None` when no frame arrived in time.
    #[must_use]
    pub fn pop(&self, timeout: Duration) -> Option<AudioFrame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Discard every queued frame, returning how many were discarded
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Number of queued frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Frames evicted because the consumer fell behind
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
