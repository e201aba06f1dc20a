//! Header <-> CAN identifier codec.
//!
//! Layout, high to low: 2 bits kind, 1 bit acknowledge, 1 bit message
//! counter (unused, always zero), 1 bit fragment, then destination, source
//! and stream id as one byte each. 29 bits in total, the width of an
//! extended CAN identifier.
//!
//! Decoding never fails. The receive path must not stall on a corrupted
//! identifier, so unassigned kind bits are logged and read as
//! [`PacketKind::Request`]. Use [`try_decode`] to see the error instead.

use tracing::error;

use crate::{
    errors::{ProtocolError, Result},
    flags::ControlFlags,
    header::{Header, PacketKind},
};

/// Largest value an extended identifier can hold.
pub const MAX_IDENTIFIER: u32 = 0x1FFF_FFFF;

const KIND_SHIFT: u32 = 27;
const DESTINATION_SHIFT: u32 = 16;
const SOURCE_SHIFT: u32 = 8;

/// Encode `header` into a 29-bit identifier.
pub fn encode(header: &Header, is_fragment: bool) -> u32 {
    let flags = ControlFlags::for_frame(header.acknowledge, is_fragment);

    (u32::from(header.kind.to_bits()) << KIND_SHIFT)
        | (u32::from(flags.bits()) << ControlFlags::SHIFT)
        | (u32::from(header.destination) << DESTINATION_SHIFT)
        | (u32::from(header.source) << SOURCE_SHIFT)
        | u32::from(header.stream_id)
}

/// Decode an identifier into its header and fragment bit.
///
/// Bits above 28 are ignored.
pub fn decode(identifier: u32) -> (Header, bool) {
    match try_decode(identifier) {
        Ok(decoded) => decoded,
        Err(err) => {
            error!(identifier, %err, "unknown packet kind, substituting request");
            let (header, is_fragment) = split(identifier);
            (Header { kind: PacketKind::Request, ..header }, is_fragment)
        },
    }
}

/// Decode an identifier, rejecting unassigned kind bits.
pub fn try_decode(identifier: u32) -> Result<(Header, bool)> {
    let bits = kind_bits(identifier);
    let kind = PacketKind::from_bits(bits).ok_or(ProtocolError::UnknownKind(bits))?;
    let (header, is_fragment) = split(identifier);
    Ok((Header { kind, ..header }, is_fragment))
}

fn kind_bits(identifier: u32) -> u8 {
    ((identifier >> KIND_SHIFT) & 0b11) as u8
}

/// Everything except the kind, which is left at its default.
fn split(identifier: u32) -> (Header, bool) {
    let flags = ControlFlags::from_bits_truncate((identifier >> ControlFlags::SHIFT) as u8 & 0b111);

    let header = Header {
        kind: PacketKind::default(),
        acknowledge: flags.contains(ControlFlags::ACKNOWLEDGE),
        source: (identifier >> SOURCE_SHIFT) as u8,
        destination: (identifier >> DESTINATION_SHIFT) as u8,
        stream_id: identifier as u8,
    };

    (header, flags.contains(ControlFlags::FRAGMENT))
}
