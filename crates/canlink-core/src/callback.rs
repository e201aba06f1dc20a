//! Response callbacks.
//!
//! An action call may carry a [`ResponseCallback`]. When the matching
//! response (or negative response) arrives, the callback runs once on the
//! thread driving the dispatcher and is then dropped together with its entry.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use canlink_proto::Header;
use parking_lot::Mutex;

use crate::outbox::Outbox;

/// Read-only view of a received response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseMessage<'a> {
    /// Header of the response
    pub header: &'a Header,
    /// Response payload, possibly empty
    pub payload: &'a Bytes,
}

impl ResponseMessage<'_> {
    /// The call was answered with a negative response.
    pub fn is_negative(&self) -> bool {
        self.header.kind == canlink_proto::PacketKind::NegativeResponse
    }
}

/// Something that handles a response.
///
/// Implemented for every `FnMut(&ResponseMessage<'_>, &mut Outbox)`.
pub trait ResponseHandler {
    /// Handle the response. New packets may be posted through `outbox`.
    fn handle_response(&mut self, message: &ResponseMessage<'_>, outbox: &mut Outbox);
}

impl<F> ResponseHandler for F
where
    F: FnMut(&ResponseMessage<'_>, &mut Outbox),
{
    fn handle_response(&mut self, message: &ResponseMessage<'_>, outbox: &mut Outbox) {
        self(message, outbox);
    }
}

/// Response handler attached to a pending action call.
pub struct ResponseCallback {
    handler: Box<dyn ResponseHandler + Send>,
}

impl ResponseCallback {
    /// Wrap any handler.
    pub fn new(handler: impl ResponseHandler + Send + 'static) -> Self {
        Self { handler: Box::new(handler) }
    }

    /// Call `method` on a shared component instance.
    pub fn bound<C>(
        component: Arc<Mutex<C>>,
        method: fn(&mut C, &ResponseMessage<'_>, &mut Outbox),
    ) -> Self
    where
        C: Send + 'static,
    {
        Self::new(move |message: &ResponseMessage<'_>, outbox: &mut Outbox| {
            method(&mut component.lock(), message, outbox);
        })
    }

    /// Run the handler.
    pub fn invoke(&mut self, header: &Header, payload: &Bytes, outbox: &mut Outbox) {
        self.handler.handle_response(&ResponseMessage { header, payload }, outbox);
    }
}

impl fmt::Debug for ResponseCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCallback").finish_non_exhaustive()
    }
}
