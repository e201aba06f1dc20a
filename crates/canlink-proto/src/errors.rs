//! Protocol error types.

use thiserror::Error;

/// Result alias for wire-level operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while building or parsing CAN frames.
///
/// None of these ever travel over the bus. Receive paths log and drop the
/// offending frame; send paths hand the error back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// More than 8 data bytes for a single CAN frame.
    #[error("frame data too long: {len} bytes (max 8)")]
    FrameTooLong {
        /// Offending length
        len: usize,
    },

    /// Identifier does not fit into 29 bits.
    #[error("identifier {0:#x} exceeds 29 bits")]
    IdentifierOutOfRange(u32),

    /// Payload exceeds what fragmentation can carry.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size that was requested
        size: usize,
        /// Protocol maximum
        max: usize,
    },

    /// A fragment frame whose index, declared size or length is inconsistent.
    #[error("malformed fragment: {reason}")]
    MalformedFragment {
        /// What was wrong with it
        reason: &'static str,
    },

    /// Unfragmented frame without its leading header byte.
    #[error("empty frame")]
    EmptyFrame,

    /// Kind bits `0b11` in an identifier.
    #[error("unknown packet kind bits {0:#04b}")]
    UnknownKind(u8),
}
