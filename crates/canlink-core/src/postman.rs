//! Local delivery.

use bytes::Bytes;
use canlink_proto::Header;

use crate::{error::DeliveryError, outbox::Outbox};

/// Knows which components live on this node and hands packets to them.
///
/// Delivery runs synchronously inside the dispatcher's pass. A component that
/// answers or calls another component does so through `outbox`; the entries
/// it posts are merged into the pending list right after delivery returns.
pub trait Postman {
    /// `header.destination` is a component on this node.
    fn is_component_available(&self, header: &Header) -> bool;

    /// Hand a request or event to its component(s). `payload` is empty for
    /// calls without arguments.
    fn deliver_packet(
        &mut self,
        header: &Header,
        payload: &Bytes,
        outbox: &mut Outbox,
    ) -> Result<(), DeliveryError>;
}

impl<P: Postman + ?Sized> Postman for &mut P {
    fn is_component_available(&self, header: &Header) -> bool {
        (**self).is_component_available(header)
    }

    fn deliver_packet(
        &mut self,
        header: &Header,
        payload: &Bytes,
        outbox: &mut Outbox,
    ) -> Result<(), DeliveryError> {
        (**self).deliver_packet(header, payload, outbox)
    }
}
