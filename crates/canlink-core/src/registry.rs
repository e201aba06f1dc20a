//! Pending-message registry.
//!
//! Every packet this node originates lives in the [`CommunicationList`] until
//! it has been delivered, acknowledged, answered or abandoned.
//!
//! # State machine
//!
//! ```text
//!                 event ──────────────────────────────> removed
//!                 local call, no callback ────────────> removed
//!                 local response (answers a call) ────> removed
//! WantToBeSent ── local call with callback ───────────> WaitForResponse
//!                 remote ─────────────────────────────> WaitForAck
//!
//! WaitForAck ──── ack, call with callback ────────────> WaitForResponse
//!                 ack, anything else ─────────────────> removed
//!                 timeout, retries left ──────────────> WaitForAck (resent)
//!                 timeout, retries exhausted ─────────> removed
//!
//! WaitForResponse ── fitting response ────────────────> removed
//! ```
//!
//! A call waiting for a response has no timeout. If the response never
//! arrives the entry stays.

use std::collections::VecDeque;

use bytes::Bytes;
use canlink_proto::{Header, PacketKind};
use tracing::{debug, trace, warn};

use crate::{
    callback::ResponseCallback,
    config::DispatcherConfig,
    connector::Backend,
    env::Tick,
    outbox::{Outbox, Placement},
    postman::Postman,
};

/// Where an entry is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Posted, not yet routed
    WantToBeSent,
    /// Sent to another node, acknowledgment outstanding
    WaitForAck,
    /// Call delivered, response outstanding
    WaitForResponse,
}

/// One pending packet.
#[derive(Debug)]
pub struct Entry {
    header: Header,
    payload: Bytes,
    callback: Option<ResponseCallback>,
    state: EntryState,
    retries: u8,
    stamp: Tick,
}

impl Entry {
    pub(crate) fn new(header: Header, payload: Bytes, callback: Option<ResponseCallback>) -> Self {
        Self {
            header,
            payload,
            callback,
            state: EntryState::WantToBeSent,
            retries: 0,
            stamp: Tick::default(),
        }
    }

    /// Packet header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Packet payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// A response callback is attached.
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Current state.
    pub fn state(&self) -> EntryState {
        self.state
    }

    /// Retransmissions so far.
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Tick of the last transmission or state change.
    pub fn stamp(&self) -> Tick {
        self.stamp
    }

    /// Run the callback, if any, with a response. Returns whether one ran.
    pub(crate) fn respond(&mut self, header: &Header, payload: &Bytes, outbox: &mut Outbox) -> bool {
        match self.callback.as_mut() {
            Some(callback) => {
                callback.invoke(header, payload, outbox);
                true
            },
            None => false,
        }
    }

    fn is_call(&self) -> bool {
        self.header.kind == PacketKind::Request && !self.header.is_event()
    }
}

/// What a step did to the entry under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Kept,
    Removed,
}

/// Ordered list of pending entries.
#[derive(Debug)]
pub struct CommunicationList {
    entries: VecDeque<Entry>,
    ack_timeout: u32,
    max_retries: u8,
}

impl CommunicationList {
    /// Empty list using the timing of `config`.
    pub fn new(config: &DispatcherConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            ack_timeout: config.ack_timeout,
            max_retries: config.max_retries,
        }
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No pending entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in processing order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Move everything in `outbox` into the list. Returns how many entries
    /// went to the front.
    pub fn merge(&mut self, outbox: &mut Outbox) -> usize {
        let mut front = 0;
        for (placement, entry) in outbox.drain() {
            trace!(header = ?entry.header, ?placement, "entry posted");
            match placement {
                Placement::Front => {
                    self.entries.push_front(entry);
                    front += 1;
                },
                Placement::Back => self.entries.push_back(entry),
            }
        }
        front
    }

    /// Apply a received acknowledgment. Returns whether an entry matched.
    pub fn handle_acknowledge(&mut self, ack: &Header) -> bool {
        let Some(index) = self.entries.iter().position(|entry| {
            entry.state == EntryState::WaitForAck
                && entry.header.kind == ack.kind
                && entry.header.fits(ack)
        }) else {
            return false;
        };

        if let Some(entry) = self.entries.get_mut(index) {
            if entry.is_call() && entry.has_callback() {
                trace!(header = ?entry.header, "acknowledged, waiting for response");
                entry.state = EntryState::WaitForResponse;
                return true;
            }
        }
        trace!(header = ?ack, "acknowledged");
        self.entries.remove(index);
        true
    }

    /// Remove and return the sent call that `response` answers.
    pub fn take_response_match(&mut self, response: &Header) -> Option<Entry> {
        let index = self.entries.iter().position(|entry| {
            entry.is_call()
                && matches!(entry.state, EntryState::WaitForAck | EntryState::WaitForResponse)
                && entry.header.fits(response)
        })?;
        self.entries.remove(index)
    }

    /// One registry pass: route new entries, retransmit or abandon overdue
    /// ones.
    ///
    /// Entries posted while the pass runs are merged after the step that
    /// posted them. Those placed at the back are visited later in this pass,
    /// those at the front on the next one.
    pub fn handle_waiting<P, B>(&mut self, now: Tick, postman: &mut P, backend: &mut B)
    where
        P: Postman,
        B: Backend,
    {
        let mut outbox = Outbox::new();
        let mut index = 0;
        while index < self.entries.len() {
            if self.step(index, now, postman, backend, &mut outbox) == Step::Kept {
                index += 1;
            }
            index += self.merge(&mut outbox);
        }
    }

    fn step<P, B>(
        &mut self,
        index: usize,
        now: Tick,
        postman: &mut P,
        backend: &mut B,
        outbox: &mut Outbox,
    ) -> Step
    where
        P: Postman,
        B: Backend,
    {
        let Some(entry) = self.entries.get_mut(index) else {
            return Step::Removed;
        };

        match entry.state {
            EntryState::WantToBeSent => self.route(index, now, postman, backend, outbox),
            EntryState::WaitForAck => {
                if now.since(entry.stamp) <= self.ack_timeout {
                    return Step::Kept;
                }
                if entry.retries > self.max_retries {
                    debug!(header = ?entry.header, retries = entry.retries, "no acknowledgment, giving up");
                    self.entries.remove(index);
                    return Step::Removed;
                }

                entry.retries += 1;
                entry.stamp = now;
                debug!(header = ?entry.header, retries = entry.retries, "retransmitting");
                let (header, payload) = (entry.header, entry.payload.clone());
                self.transmit(index, header, payload, backend)
            },
            EntryState::WaitForResponse => Step::Kept,
        }
    }

    fn route<P, B>(
        &mut self,
        index: usize,
        now: Tick,
        postman: &mut P,
        backend: &mut B,
        outbox: &mut Outbox,
    ) -> Step
    where
        P: Postman,
        B: Backend,
    {
        let Some(entry) = self.entries.get_mut(index) else {
            return Step::Removed;
        };
        let header = entry.header;
        let payload = entry.payload.clone();

        if header.is_event() {
            deliver(postman, &header, &payload, outbox);
            if let Err(err) = backend.send_packet(header, payload) {
                warn!(?header, %err, "event not sent");
            }
            self.entries.remove(index);
            return Step::Removed;
        }

        if !postman.is_component_available(&header) {
            entry.state = EntryState::WaitForAck;
            entry.stamp = now;
            return self.transmit(index, header, payload, backend);
        }

        if header.kind == PacketKind::Request {
            deliver(postman, &header, &payload, outbox);
            if let Some(entry) = self.entries.get_mut(index) {
                if entry.has_callback() {
                    entry.state = EntryState::WaitForResponse;
                    entry.stamp = now;
                    return Step::Kept;
                }
            }
            self.entries.remove(index);
            return Step::Removed;
        }

        // Local response: the call it answers can only be behind it.
        self.entries.remove(index);
        let call = self
            .entries
            .iter()
            .skip(index)
            .position(|entry| {
                entry.is_call() && entry.state != EntryState::WantToBeSent && entry.header.fits(&header)
            })
            .map(|offset| index + offset);

        match call.and_then(|call| self.entries.remove(call)) {
            Some(mut call) => {
                trace!(?header, "local response matched");
                call.respond(&header, &payload, outbox);
            },
            None => debug!(?header, "local response matches no pending call"),
        }
        Step::Removed
    }

    fn transmit<B: Backend>(&mut self, index: usize, header: Header, payload: Bytes, backend: &mut B) -> Step {
        match backend.send_packet(header, payload) {
            Ok(()) => Step::Kept,
            Err(err) => {
                warn!(?header, %err, "packet cannot be sent, dropping entry");
                self.entries.remove(index);
                Step::Removed
            },
        }
    }
}

fn deliver<P: Postman>(postman: &mut P, header: &Header, payload: &Bytes, outbox: &mut Outbox) {
    if let Err(err) = postman.deliver_packet(header, payload, outbox) {
        warn!(?header, %err, "local delivery failed");
    }
}
