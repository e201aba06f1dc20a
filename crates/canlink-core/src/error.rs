//! Error types.

use thiserror::Error;

/// Why a post was refused.
///
/// Returned synchronously; nothing has been queued or sent when a post fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostError {
    /// Payload does not fit even in a fragmented packet
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Requested payload size
        size: usize,
        /// Protocol maximum
        max: usize,
    },

    /// Header does not match the kind of post
    #[error("invalid header for {operation}: {reason}")]
    InvalidHeader {
        /// Post operation that was called
        operation: &'static str,
        /// What is wrong with the header
        reason: &'static str,
    },
}

/// Why the postman could not hand a packet to a local component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// No component with that address on this node
    #[error("no component {0}")]
    NoComponent(u8),

    /// Component exists but does not handle this packet
    #[error("component {component} has no action for stream {stream_id}")]
    NoAction {
        /// Destination component
        component: u8,
        /// Stream id of the packet
        stream_id: u8,
    },

    /// Component rejected the payload size
    #[error("wrong payload length: expected {expected}, got {actual}")]
    WrongPayloadLength {
        /// Length the action expects
        expected: usize,
        /// Length received
        actual: usize,
    },
}
