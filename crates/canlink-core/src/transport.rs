//! CAN driver abstraction.
//!
//! The engine never blocks on the bus. Every method here is a poll: the
//! driver reports what it can do right now and the periodic pass comes back
//! later for the rest.

use canlink_proto::CanFrame;

/// A CAN controller as seen by the [`crate::CanConnector`].
pub trait CanDriver {
    /// A received frame is waiting.
    fn is_frame_available(&self) -> bool;

    /// Take the next received frame, if any.
    fn receive_frame(&mut self) -> Option<CanFrame>;

    /// A transmit slot is free.
    fn can_send(&self) -> bool;

    /// Hand a frame to the controller. `false` if it was not accepted.
    fn send_frame(&mut self, frame: &CanFrame) -> bool;
}

impl<D: CanDriver + ?Sized> CanDriver for &mut D {
    fn is_frame_available(&self) -> bool {
        (**self).is_frame_available()
    }

    fn receive_frame(&mut self) -> Option<CanFrame> {
        (**self).receive_frame()
    }

    fn can_send(&self) -> bool {
        (**self).can_send()
    }

    fn send_frame(&mut self, frame: &CanFrame) -> bool {
        (**self).send_frame(frame)
    }
}
