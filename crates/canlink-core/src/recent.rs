//! Recently delivered calls.
//!
//! A sender retransmits a call until it sees the acknowledgment, so a lost
//! acknowledgment brings the same call back. The receiver remembers what it
//! delivered for a while: a repeat is acknowledged again but not delivered.
//!
//! Two calls with the same header and payload inside the window are
//! indistinguishable from a retransmission and only the first is delivered.

use std::collections::VecDeque;

use bytes::Bytes;
use canlink_proto::Header;

use crate::{config::DispatcherConfig, env::Tick};

#[derive(Debug)]
struct Seen {
    header: Header,
    payload: Bytes,
    stamp: Tick,
}

/// Bounded memory of calls delivered to local components.
#[derive(Debug)]
pub struct RecentCalls {
    calls: VecDeque<Seen>,
    capacity: usize,
    window: u32,
}

impl RecentCalls {
    /// Empty table sized from `config`.
    pub fn new(config: &DispatcherConfig) -> Self {
        Self {
            calls: VecDeque::with_capacity(config.duplicate_capacity),
            capacity: config.duplicate_capacity,
            window: config.duplicate_window,
        }
    }

    /// Calls currently remembered.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Nothing remembered.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Record a call arriving at `now`. Returns `false` if the same call was
    /// already delivered within the window.
    ///
    /// A repeat restarts its window, so a sender that keeps retrying is
    /// still recognized.
    pub fn first_delivery(&mut self, header: &Header, payload: &Bytes, now: Tick) -> bool {
        let window = self.window;
        self.calls.retain(|seen| now.since(seen.stamp) <= window);

        if let Some(seen) = self
            .calls
            .iter_mut()
            .find(|seen| seen.header == *header && seen.payload == *payload)
        {
            seen.stamp = now;
            return false;
        }

        if self.capacity == 0 {
            return true;
        }
        if self.calls.len() == self.capacity {
            self.calls.pop_front();
        }
        self.calls.push_back(Seen { header: *header, payload: payload.clone(), stamp: now });
        true
    }
}
