//! Any 29-bit identifier decodes, and every header with a valid kind
//! re-encodes to the identifier it came from (the counter bit excepted).

#![no_main]

use libfuzzer_sys::fuzz_target;

const COUNTER_BIT: u32 = 1 << 25;

fuzz_target!(|identifier: u32| {
    let identifier = identifier & 0x1FFF_FFFF;
    let (header, fragment) = canlink_proto::decode(identifier);

    if canlink_proto::try_decode(identifier).is_ok() {
        assert_eq!(canlink_proto::encode(&header, fragment), identifier & !COUNTER_BIT);
    }
});
