//! Arbitrary frame sequences never panic the reassembler, and whatever it
//! completes fits the protocol limit.

#![no_main]

use canlink_proto::{CanFrame, MAX_PAYLOAD_SIZE, Reassembler};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reassembler = Reassembler::new(4);

    // Each record: 4 identifier bytes, 1 length byte, up to 8 data bytes.
    let mut rest = data;
    while rest.len() >= 5 {
        let identifier = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let len = usize::from(rest[4] % 9).min(rest.len() - 5);
        let Ok(frame) = CanFrame::new(identifier & 0x1FFF_FFFF, &rest[5..5 + len]) else {
            break;
        };
        rest = &rest[5 + len..];

        if let Ok(Some((_, payload))) = reassembler.push(&frame) {
            assert!(payload.len() <= MAX_PAYLOAD_SIZE);
        }
        assert!(reassembler.in_progress() <= 4);
    }
});
