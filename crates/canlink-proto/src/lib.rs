//! Wire format for canlink.
//!
//! A canlink packet is addressed by a [`Header`] that lives entirely inside
//! the 29-bit extended CAN identifier, so the bus arbitrates on kind and
//! addressing without touching the data bytes. Payloads that do not fit in a
//! single 8-byte frame are split into numbered fragments and reassembled on
//! the receiving node.
//!
//! ```text
//!  28 27   26    25      24     23 ....... 16  15 ........ 8  7 ......... 0
//! ┌─────┬─────┬───────┬──────┬──────────────┬──────────────┬──────────────┐
//! │kind │ ack │counter│ frag │ destination  │    source    │  stream id   │
//! └─────┴─────┴───────┴──────┴──────────────┴──────────────┴──────────────┘
//! ```
//!
//! # Limits
//!
//! A fragmented payload is at most [`MAX_PAYLOAD_SIZE`] bytes (eight fragments
//! of six bytes, tracked in an 8-bit bitmap). Anything larger is rejected
//! before a single frame is produced.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod flags;
pub mod fragment;
pub mod frame;
pub mod header;
pub mod identifier;

pub use errors::{ProtocolError, Result};
pub use flags::ControlFlags;
pub use fragment::{
    FRAGMENT_DATA_SIZE, Fragmenter, MAX_PAYLOAD_SIZE, Reassembler, SINGLE_FRAME_CAPACITY,
    encode_packet,
};
pub use frame::CanFrame;
pub use header::{Header, PacketKind};
pub use identifier::{decode, encode, try_decode};
