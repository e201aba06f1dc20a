//! Scriptable postman.
//!
//! A [`ComponentTable`] stands in for the components of one node. Tests
//! register addresses and, per `(address, stream_id)`, a handler that runs
//! when a call arrives. Every accepted packet is recorded as a [`Delivery`].

use std::{collections::HashMap, fmt};

use bytes::Bytes;
use canlink_core::{DeliveryError, Outbox, Postman};
use canlink_proto::{Header, PacketKind};
use tracing::debug;

type CallHandler = Box<dyn FnMut(&Header, &Bytes, &mut Outbox) + Send>;

/// One packet handed to a local component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Packet header
    pub header: Header,
    /// Packet payload
    pub payload: Bytes,
}

/// Components living on one simulated node.
#[derive(Default)]
pub struct ComponentTable {
    addresses: Vec<u8>,
    handlers: HashMap<(u8, u8), CallHandler>,
    deliveries: Vec<Delivery>,
}

impl ComponentTable {
    /// Node without components.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component at `address`.
    #[must_use]
    pub fn with_component(mut self, address: u8) -> Self {
        if !self.addresses.contains(&address) {
            self.addresses.push(address);
        }
        self
    }

    /// Run `handler` for calls to `address` on `stream_id`. Adds the
    /// component if needed.
    #[must_use]
    pub fn on_call(
        self,
        address: u8,
        stream_id: u8,
        handler: impl FnMut(&Header, &Bytes, &mut Outbox) + Send + 'static,
    ) -> Self {
        let mut table = self.with_component(address);
        table.handlers.insert((address, stream_id), Box::new(handler));
        table
    }

    /// Answer calls to `address` on `stream_id` with their own payload.
    #[must_use]
    pub fn echo(self, address: u8, stream_id: u8) -> Self {
        self.on_call(address, stream_id, |header, payload, outbox| {
            if let Err(err) = outbox.post_response(header.reply(PacketKind::Response), payload.clone()) {
                debug!(%err, "echo response refused");
            }
        })
    }

    /// Everything delivered so far, oldest first.
    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    /// Events delivered so far.
    pub fn events(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(|delivery| delivery.header.is_event())
    }
}

impl Postman for ComponentTable {
    fn is_component_available(&self, header: &Header) -> bool {
        self.addresses.contains(&header.destination)
    }

    fn deliver_packet(
        &mut self,
        header: &Header,
        payload: &Bytes,
        outbox: &mut Outbox,
    ) -> Result<(), DeliveryError> {
        if !header.is_event() {
            if !self.is_component_available(header) {
                return Err(DeliveryError::NoComponent(header.destination));
            }
            if let Some(handler) = self.handlers.get_mut(&(header.destination, header.stream_id)) {
                handler(header, payload, outbox);
            }
        }

        self.deliveries.push(Delivery { header: *header, payload: payload.clone() });
        Ok(())
    }
}

impl fmt::Debug for ComponentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTable")
            .field("addresses", &self.addresses)
            .field("handlers", &self.handlers.len())
            .field("deliveries", &self.deliveries.len())
            .finish()
    }
}
