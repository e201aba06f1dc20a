//! Posts staged for the pending list.
//!
//! The application posts through the [`crate::Dispatcher`]; components and
//! callbacks that run inside a pass post through the `&mut Outbox` they are
//! handed. Either way the entries are validated here and merged into the
//! [`crate::CommunicationList`] by the registry, responses at the front and
//! everything else at the back.

use bytes::Bytes;
use canlink_proto::{Header, MAX_PAYLOAD_SIZE, PacketKind};

use crate::{callback::ResponseCallback, error::PostError, registry::Entry};

/// Which end of the pending list a post goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Front,
    Back,
}

/// Validated posts waiting to be merged into the pending list.
#[derive(Debug, Default)]
pub struct Outbox {
    posts: Vec<(Placement, Entry)>,
}

impl Outbox {
    /// Empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event. `header` must be a request addressed to the event
    /// destination.
    pub fn post_event(&mut self, header: Header, payload: Bytes) -> Result<(), PostError> {
        check("post_event", &header, &payload)?;
        if header.kind != PacketKind::Request {
            return Err(invalid("post_event", "events are requests"));
        }
        if !header.is_event() {
            return Err(invalid("post_event", "destination is not the event address"));
        }
        self.push(Placement::Back, Entry::new(header, payload, None));
        Ok(())
    }

    /// Answer an action call with a response or negative response.
    pub fn post_response(&mut self, header: Header, payload: Bytes) -> Result<(), PostError> {
        check("post_response", &header, &payload)?;
        if !header.kind.is_response() {
            return Err(invalid("post_response", "kind is not a response"));
        }
        if header.is_event() {
            return Err(invalid("post_response", "responses cannot be broadcast"));
        }
        self.push(Placement::Front, Entry::new(header, payload, None));
        Ok(())
    }

    /// Answer an action call with a negative response. The kind of `header`
    /// is replaced.
    pub fn post_negative_response(
        &mut self,
        header: Header,
        payload: Bytes,
    ) -> Result<(), PostError> {
        self.post_response(Header { kind: PacketKind::NegativeResponse, ..header }, payload)
    }

    /// Call an action on another component without waiting for its answer.
    pub fn post_action_call(&mut self, header: Header, payload: Bytes) -> Result<(), PostError> {
        check_call("post_action_call", &header, &payload)?;
        self.push(Placement::Back, Entry::new(header, payload, None));
        Ok(())
    }

    /// Call an action on another component; `callback` runs once when the
    /// response arrives.
    pub fn post_action_call_with_callback(
        &mut self,
        header: Header,
        payload: Bytes,
        callback: ResponseCallback,
    ) -> Result<(), PostError> {
        check_call("post_action_call_with_callback", &header, &payload)?;
        self.push(Placement::Back, Entry::new(header, payload, Some(callback)));
        Ok(())
    }

    /// Posts waiting.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Nothing posted.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub(crate) fn drain(&mut self) -> std::vec::Drain<'_, (Placement, Entry)> {
        self.posts.drain(..)
    }

    fn push(&mut self, placement: Placement, entry: Entry) {
        self.posts.push((placement, entry));
    }
}

fn check(operation: &'static str, header: &Header, payload: &Bytes) -> Result<(), PostError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(PostError::PayloadTooLarge { size: payload.len(), max: MAX_PAYLOAD_SIZE });
    }
    if header.acknowledge {
        return Err(invalid(operation, "acknowledgments are generated internally"));
    }
    Ok(())
}

fn check_call(operation: &'static str, header: &Header, payload: &Bytes) -> Result<(), PostError> {
    check(operation, header, payload)?;
    if header.kind != PacketKind::Request {
        return Err(invalid(operation, "kind is not a request"));
    }
    if header.is_event() {
        return Err(invalid(operation, "destination is the event address"));
    }
    Ok(())
}

fn invalid(operation: &'static str, reason: &'static str) -> PostError {
    PostError::InvalidHeader { operation, reason }
}
