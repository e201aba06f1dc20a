//! Frame queue shared between a receive interrupt (or driver thread) and the
//! periodic pass.
//!
//! The lock is taken for exactly one push or pop and never across a routing
//! decision, so the producer side waits at most for a `VecDeque` operation.

use std::{collections::VecDeque, sync::Arc};

use canlink_proto::CanFrame;
use parking_lot::Mutex;

#[derive(Debug)]
struct Inner {
    frames: VecDeque<CanFrame>,
    capacity: usize,
    overflows: u64,
}

/// Bounded FIFO of frames. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    inner: Arc<Mutex<Inner>>,
}

impl FrameQueue {
    /// Queue holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                capacity,
                overflows: 0,
            })),
        }
    }

    /// Append a frame. A full queue drops the new frame, counts it and
    /// returns `false`.
    pub fn push(&self, frame: CanFrame) -> bool {
        let mut inner = self.inner.lock();
        if inner.frames.len() >= inner.capacity {
            inner.overflows += 1;
            return false;
        }
        inner.frames.push_back(frame);
        true
    }

    /// Take the oldest frame.
    pub fn pop(&self) -> Option<CanFrame> {
        self.inner.lock().frames.pop_front()
    }

    /// Frames waiting.
    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Nothing waiting.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    /// Frames dropped because the queue was full.
    pub fn overflows(&self) -> u64 {
        self.inner.lock().overflows
    }
}
