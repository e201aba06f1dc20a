//! Arbitrary received frames and tick jumps never panic a dispatcher.

#![no_main]

use std::collections::VecDeque;

use bytes::Bytes;
use canlink_core::{
    CanDriver, DeliveryError, Dispatcher, DispatcherConfig, Environment, Outbox, Postman, Tick,
};
use canlink_proto::{CanFrame, Header, PacketKind};
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Driver {
    rx: VecDeque<CanFrame>,
}

impl CanDriver for Driver {
    fn is_frame_available(&self) -> bool {
        !self.rx.is_empty()
    }

    fn receive_frame(&mut self) -> Option<CanFrame> {
        self.rx.pop_front()
    }

    fn can_send(&self) -> bool {
        true
    }

    fn send_frame(&mut self, _frame: &CanFrame) -> bool {
        true
    }
}

/// Components 1..=4 live here and answer every call.
struct Echo;

impl Postman for Echo {
    fn is_component_available(&self, header: &Header) -> bool {
        (1..=4).contains(&header.destination)
    }

    fn deliver_packet(
        &mut self,
        header: &Header,
        payload: &Bytes,
        outbox: &mut Outbox,
    ) -> Result<(), DeliveryError> {
        if !header.is_event() {
            let _ = outbox.post_response(header.reply(PacketKind::Response), payload.clone());
        }
        Ok(())
    }
}

struct Clock(std::cell::Cell<u32>);

impl Environment for Clock {
    fn now(&self) -> Tick {
        Tick(self.0.get())
    }
}

fuzz_target!(|data: &[u8]| {
    let mut dispatcher =
        Dispatcher::new(Driver::default(), Echo, Clock(std::cell::Cell::new(0)), DispatcherConfig::default());
    let _ = dispatcher.post_action_call(Header::request(1, 9, 1), Bytes::new());

    for chunk in data.chunks(13) {
        if chunk.len() < 5 {
            break;
        }
        let identifier = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) & 0x1FFF_FFFF;
        let len = usize::from(chunk[4] % 9).min(chunk.len() - 5);
        if let Ok(frame) = CanFrame::new(identifier, &chunk[5..5 + len]) {
            dispatcher.connector_mut().driver_mut().rx.push_back(frame);
        }

        let clock = &dispatcher.env().0;
        clock.set(clock.get().wrapping_add(u32::from(chunk[4]) * 7));
        dispatcher.update();
    }
});
