//! Fragmentation and reassembly over 8-byte frames.
//!
//! Two frame shapes exist on the bus:
//!
//! ```text
//! unfragmented (payload <= 7):  [ 0x00 | payload ... ]
//! fragment     (payload 8..=48): [ index | total | up to 6 data bytes ]
//! ```
//!
//! Fragment `i` carries payload bytes `6*i .. min(6*i + 6, total)`. All
//! fragments but the last are full. The receiver tracks arrivals in an 8-bit
//! bitmap per [`Header`], which is why the payload limit is eight fragments.
//!
//! The bus cannot ask a sender to repeat a fragment, so a malformed frame is
//! reported to the caller and otherwise dropped. It never disturbs a record
//! that is already collecting fragments.
//!
//! A fragment index that was already received means the sender started the
//! packet over, or a new packet reused the header. The record restarts with
//! just that fragment. The one exception is an identical copy of the fragment
//! received last, which is the bus repeating a frame and is ignored.

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    errors::{ProtocolError, Result},
    frame::{CanFrame, MAX_FRAME_DATA},
    header::Header,
    identifier,
};

/// Largest payload that travels in a single unfragmented frame.
pub const SINGLE_FRAME_CAPACITY: usize = MAX_FRAME_DATA - 1;

/// Payload bytes carried by every fragment but the last.
pub const FRAGMENT_DATA_SIZE: usize = MAX_FRAME_DATA - FragmentPrefix::SIZE;

/// Largest payload the protocol can carry.
pub const MAX_PAYLOAD_SIZE: usize = 8 * FRAGMENT_DATA_SIZE;

/// Reserved first byte of an unfragmented frame.
const SINGLE_FRAME_HEADER: u8 = 0x00;

/// First two bytes of a fragment frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FragmentPrefix {
    /// Position of this fragment, starting at zero
    pub index: u8,
    /// Size of the whole payload
    pub total: u8,
}

impl FragmentPrefix {
    /// Encoded size
    pub const SIZE: usize = 2;
}

/// Number of fragments needed for `total` payload bytes.
pub const fn fragment_count(total: usize) -> usize {
    total.div_ceil(FRAGMENT_DATA_SIZE)
}

/// Splits one packet into frames, one frame at a time.
///
/// The caller decides when a frame was really sent and only then calls
/// [`advance`](Self::advance), so a busy driver simply sees the same frame
/// again on the next attempt.
#[derive(Debug, Clone)]
pub struct Fragmenter {
    header: Header,
    payload: Bytes,
    index: u8,
    count: u8,
}

impl Fragmenter {
    /// Prepare `payload` for sending under `header`.
    pub fn new(header: Header, payload: Bytes) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let count = if payload.len() <= SINGLE_FRAME_CAPACITY { 1 } else { fragment_count(payload.len()) };
        Ok(Self { header, payload, index: 0, count: count as u8 })
    }

    /// Header every frame is addressed with.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Payload is split over more than one frame.
    pub fn is_fragmented(&self) -> bool {
        self.payload.len() > SINGLE_FRAME_CAPACITY
    }

    /// Total frames this packet needs.
    pub fn frame_count(&self) -> usize {
        usize::from(self.count)
    }

    /// Every frame has been handed out.
    pub fn is_finished(&self) -> bool {
        self.index >= self.count
    }

    /// Frame to send next, without consuming it.
    pub fn peek(&self) -> Option<CanFrame> {
        if self.is_finished() {
            return None;
        }

        let mut buf = [0u8; MAX_FRAME_DATA];
        let len = if self.is_fragmented() {
            let offset = usize::from(self.index) * FRAGMENT_DATA_SIZE;
            let end = (offset + FRAGMENT_DATA_SIZE).min(self.payload.len());
            let chunk = &self.payload[offset..end];

            let prefix = FragmentPrefix { index: self.index, total: self.payload.len() as u8 };
            buf[..FragmentPrefix::SIZE].copy_from_slice(prefix.as_bytes());
            buf[FragmentPrefix::SIZE..FragmentPrefix::SIZE + chunk.len()].copy_from_slice(chunk);
            FragmentPrefix::SIZE + chunk.len()
        } else {
            buf[0] = SINGLE_FRAME_HEADER;
            buf[1..=self.payload.len()].copy_from_slice(&self.payload);
            1 + self.payload.len()
        };

        let identifier = identifier::encode(&self.header, self.is_fragmented());
        Some(CanFrame::from_valid(identifier, &buf[..len]))
    }

    /// Mark the current frame as sent.
    pub fn advance(&mut self) {
        if !self.is_finished() {
            self.index += 1;
        }
    }
}

impl Iterator for Fragmenter {
    type Item = CanFrame;

    fn next(&mut self) -> Option<CanFrame> {
        let frame = self.peek()?;
        self.advance();
        Some(frame)
    }
}

/// All frames for one packet.
pub fn encode_packet(header: Header, payload: Bytes) -> Result<Vec<CanFrame>> {
    Ok(Fragmenter::new(header, payload)?.collect())
}

/// Partially received packet.
#[derive(Debug)]
struct Record {
    header: Header,
    total: u8,
    received: u8,
    last: Option<u8>,
    data: BytesMut,
}

impl Record {
    fn new(header: Header, total: u8) -> Self {
        Self { header, total, received: 0, last: None, data: BytesMut::zeroed(usize::from(total)) }
    }

    fn reset(&mut self, total: u8) {
        self.total = total;
        self.received = 0;
        self.last = None;
        self.data = BytesMut::zeroed(usize::from(total));
    }
}

/// Turns received frames back into packets.
///
/// Holds at most one record per header. When `capacity` records are open and
/// a fragment for a new header arrives, the oldest record is dropped.
#[derive(Debug)]
pub struct Reassembler {
    records: Vec<Record>,
    capacity: usize,
}

impl Reassembler {
    /// Default number of packets that may be in reassembly at once.
    pub const DEFAULT_CAPACITY: usize = 8;

    /// Create a reassembler tracking at most `capacity` packets.
    pub fn new(capacity: usize) -> Self {
        Self { records: Vec::new(), capacity: capacity.max(1) }
    }

    /// Packets currently being reassembled.
    pub fn in_progress(&self) -> usize {
        self.records.len()
    }

    /// Feed one received frame.
    ///
    /// Returns the complete packet once its last missing frame arrived,
    /// `Ok(None)` while fragments are still outstanding, and an error for a
    /// frame that has to be dropped.
    pub fn push(&mut self, frame: &CanFrame) -> Result<Option<(Header, Bytes)>> {
        let (header, is_fragment) = identifier::decode(frame.identifier());

        if !is_fragment {
            let payload = frame.data().get(1..).ok_or(ProtocolError::EmptyFrame)?;
            return Ok(Some((header, Bytes::copy_from_slice(payload))));
        }

        self.push_fragment(header, frame.data())
    }

    fn push_fragment(&mut self, header: Header, data: &[u8]) -> Result<Option<(Header, Bytes)>> {
        let Ok((prefix, chunk)) = FragmentPrefix::ref_from_prefix(data) else {
            return Err(malformed("fragment shorter than its prefix"));
        };
        let total = usize::from(prefix.total);
        let count = fragment_count(total);

        if chunk.is_empty() {
            return Err(malformed("fragment without data"));
        }
        if total > MAX_PAYLOAD_SIZE {
            return Err(malformed("declared size exceeds maximum"));
        }
        if total <= SINGLE_FRAME_CAPACITY {
            return Err(malformed("declared size fits a single frame"));
        }
        if usize::from(prefix.index) >= count {
            return Err(malformed("fragment index out of range"));
        }

        let offset = usize::from(prefix.index) * FRAGMENT_DATA_SIZE;
        let expected = if usize::from(prefix.index) + 1 == count { total - offset } else { FRAGMENT_DATA_SIZE };
        if chunk.len() != expected {
            return Err(malformed("fragment length mismatch"));
        }

        let position = match self.records.iter().position(|r| r.header == header) {
            Some(position) => position,
            None => {
                if self.records.len() >= self.capacity {
                    let evicted = self.records.remove(0);
                    warn!(header = ?evicted.header, "reassembly table full, dropping oldest packet");
                }
                self.records.push(Record::new(header, prefix.total));
                self.records.len() - 1
            },
        };
        let record = &mut self.records[position];

        if record.total != prefix.total {
            warn!(?header, "lost fragment: declared size changed");
            record.reset(prefix.total);
        }

        let bit = 1u8 << prefix.index;
        let slot = &mut record.data[offset..offset + chunk.len()];
        if record.received & bit != 0 {
            if record.last == Some(prefix.index) && *slot == *chunk {
                debug!(?header, index = prefix.index, "repeated fragment");
                return Ok(None);
            }
            warn!(?header, index = prefix.index, "lost fragment: packet restarted");
            record.received = 0;
        }

        slot.copy_from_slice(chunk);
        record.received |= bit;
        record.last = Some(prefix.index);

        if record.received.count_ones() as usize == count {
            let record = self.records.remove(position);
            return Ok(Some((record.header, record.data.freeze())));
        }

        Ok(None)
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

fn malformed(reason: &'static str) -> ProtocolError {
    ProtocolError::MalformedFragment { reason }
}
