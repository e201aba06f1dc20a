//! Property tests for the wire format.
//!
//! - Identifier encode/decode are inverses for every header and fragment bit
//! - Any payload up to the protocol limit survives fragmentation, whatever
//!   order the frames arrive in and however often the bus repeats one

use bytes::Bytes;
use canlink_proto::{
    CanFrame, Fragmenter, Header, MAX_PAYLOAD_SIZE, PacketKind, ProtocolError, Reassembler,
    SINGLE_FRAME_CAPACITY, decode, encode, encode_packet, try_decode,
};
use proptest::prelude::*;

fn kind() -> impl Strategy<Value = PacketKind> {
    prop_oneof![
        Just(PacketKind::Request),
        Just(PacketKind::Response),
        Just(PacketKind::NegativeResponse),
    ]
}

fn header() -> impl Strategy<Value = Header> {
    (kind(), any::<bool>(), any::<u8>(), any::<u8>(), any::<u8>()).prop_map(
        |(kind, acknowledge, source, destination, stream_id)| {
            Header::new(kind, acknowledge, source, destination, stream_id)
        },
    )
}

/// Feed `frames` into a fresh reassembler, returning every completed packet.
fn reassemble(frames: &[CanFrame]) -> Vec<(Header, Bytes)> {
    let mut reassembler = Reassembler::default();
    frames.iter().filter_map(|frame| reassembler.push(frame).ok().flatten()).collect()
}

proptest! {
    #[test]
    fn identifier_roundtrip(header in header(), is_fragment in any::<bool>()) {
        let identifier = encode(&header, is_fragment);
        prop_assert!(identifier < (1 << 29));
        prop_assert_eq!(decode(identifier), (header, is_fragment));
        prop_assert_eq!(try_decode(identifier), Ok((header, is_fragment)));
    }

    #[test]
    fn decode_never_fails(identifier in 0u32..(1 << 29)) {
        let (header, is_fragment) = decode(identifier);
        // Re-encoding reproduces everything except the counter bit and an
        // unassigned kind.
        let reencoded = encode(&header, is_fragment);
        prop_assert_eq!(reencoded & 0x01FF_FFFF, identifier & 0x01FF_FFFF);
    }

    #[test]
    fn fragmentation_roundtrip_in_order(
        header in header(),
        payload in prop::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_SIZE),
    ) {
        let frames = encode_packet(header, Bytes::from(payload.clone())).unwrap();
        prop_assert_eq!(frames.len() > 1, payload.len() > SINGLE_FRAME_CAPACITY);

        let packets = reassemble(&frames);
        prop_assert_eq!(packets, vec![(header, Bytes::from(payload))]);
    }

    #[test]
    fn fragmentation_roundtrip_any_order_with_repeats(
        header in header(),
        payload in prop::collection::vec(any::<u8>(), (SINGLE_FRAME_CAPACITY + 1)..=MAX_PAYLOAD_SIZE),
        order in prop::collection::vec(any::<prop::sample::Index>(), 0..16),
        repeats in prop::collection::vec(1usize..=3, 8),
    ) {
        let frames = encode_packet(header, Bytes::from(payload.clone())).unwrap();

        // Every frame once in a shuffled order, each copied back to back as a
        // bus repeating a frame would.
        let mut shuffled = frames.clone();
        for (n, i) in order.iter().enumerate() {
            let a = n % shuffled.len();
            let b = i.index(shuffled.len());
            shuffled.swap(a, b);
        }
        let delivery: Vec<CanFrame> = shuffled
            .iter()
            .zip(&repeats)
            .flat_map(|(frame, &count)| std::iter::repeat_n(*frame, count))
            .collect();

        let packets = reassemble(&delivery);
        prop_assert_eq!(packets, vec![(header, Bytes::from(payload))]);
    }

    #[test]
    fn oversized_payload_rejected(extra in 1usize..64) {
        let size = MAX_PAYLOAD_SIZE + extra;
        let result = Fragmenter::new(Header::request(1, 2, 3), Bytes::from(vec![0; size]));
        prop_assert_eq!(
            result.err(),
            Some(ProtocolError::PayloadTooLarge { size, max: MAX_PAYLOAD_SIZE })
        );
    }

    #[test]
    fn reassembler_survives_garbage(
        identifier in 0u32..(1 << 29),
        data in prop::collection::vec(any::<u8>(), 0..=8),
    ) {
        let frame = CanFrame::new(identifier, &data).unwrap();
        let mut reassembler = Reassembler::default();
        let _ = reassembler.push(&frame);
        prop_assert!(reassembler.in_progress() <= 1);
    }
}
