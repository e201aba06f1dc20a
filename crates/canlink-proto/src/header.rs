//! Packet header.
//!
//! The header is the logical addressing of a packet, independent of how many
//! frames it took to move it across the bus. It is a plain value: copy it,
//! compare it, hash it.

/// Address reserved for events. A packet sent to it is broadcast to every
/// node and never acknowledged.
pub const EVENT_DESTINATION: u8 = 0;

/// What a packet is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PacketKind {
    /// Action call or event
    #[default]
    Request,
    /// Successful answer to an action call
    Response,
    /// Failed answer to an action call
    NegativeResponse,
}

impl PacketKind {
    /// The 2-bit wire value.
    pub const fn to_bits(self) -> u8 {
        match self {
            Self::Request => 0,
            Self::Response => 1,
            Self::NegativeResponse => 2,
        }
    }

    /// Parse the 2-bit wire value. `0b11` is unassigned.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0 => Some(Self::Request),
            1 => Some(Self::Response),
            2 => Some(Self::NegativeResponse),
            _ => None,
        }
    }

    /// `Response` or `NegativeResponse`.
    pub const fn is_response(self) -> bool {
        matches!(self, Self::Response | Self::NegativeResponse)
    }
}

/// Addressing and classification of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Header {
    /// Packet kind
    pub kind: PacketKind,
    /// Set on acknowledgments; an acknowledgment carries no payload
    pub acknowledge: bool,
    /// Sending component
    pub source: u8,
    /// Receiving component, [`EVENT_DESTINATION`] for events
    pub destination: u8,
    /// Correlates a response with the request that caused it
    pub stream_id: u8,
}

impl Header {
    /// Create a header.
    pub const fn new(
        kind: PacketKind,
        acknowledge: bool,
        source: u8,
        destination: u8,
        stream_id: u8,
    ) -> Self {
        Self { kind, acknowledge, source, destination, stream_id }
    }

    /// Action call from `source` to `destination`.
    pub const fn request(source: u8, destination: u8, stream_id: u8) -> Self {
        Self::new(PacketKind::Request, false, source, destination, stream_id)
    }

    /// Event published by `source`.
    pub const fn event(source: u8, stream_id: u8) -> Self {
        Self::new(PacketKind::Request, false, source, EVENT_DESTINATION, stream_id)
    }

    /// Header answering `self` with `kind`: addresses swapped, stream kept.
    pub const fn reply(&self, kind: PacketKind) -> Self {
        Self::new(kind, false, self.destination, self.source, self.stream_id)
    }

    /// Acknowledgment of `self`: same kind, addresses swapped, ack bit set.
    pub const fn acknowledgment(&self) -> Self {
        Self::new(self.kind, true, self.destination, self.source, self.stream_id)
    }

    /// Broadcast with no reply expected.
    pub const fn is_event(&self) -> bool {
        self.destination == EVENT_DESTINATION
    }

    /// Whether `other` answers (or acknowledges) a packet sent with `self`.
    ///
    /// Kind and the ack bit are not compared; callers that care check them.
    pub const fn fits(&self, other: &Self) -> bool {
        other.source == self.destination
            && other.destination == self.source
            && other.stream_id == self.stream_id
    }
}
