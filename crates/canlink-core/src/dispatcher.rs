//! Public API and inbound routing.
//!
//! A [`Dispatcher`] owns one node's connector, pending list and postman.
//! The application posts packets at any time and calls
//! [`update`](Dispatcher::update) periodically, e.g. from a 1 ms timer task.
//!
//! # Inbound routing
//!
//! | packet                         | action                                              |
//! |--------------------------------|-----------------------------------------------------|
//! | acknowledgment                 | close the matching `WaitForAck` entry               |
//! | event                          | deliver locally, never acknowledged                 |
//! | call for a local component     | deliver unless recently delivered, acknowledge      |
//! | call for another node          | ignore                                              |
//! | (negative) response            | close the call it answers, run its callback, acknowledge if addressed here |

use bytes::Bytes;
use canlink_proto::{Header, PacketKind};
use tracing::{debug, trace, warn};

use crate::{
    callback::ResponseCallback,
    config::DispatcherConfig,
    connector::{Backend, CanConnector},
    env::{Environment, Tick},
    error::PostError,
    outbox::Outbox,
    postman::Postman,
    recent::RecentCalls,
    registry::CommunicationList,
    transport::CanDriver,
};

/// Reliability and routing engine for one node.
#[derive(Debug)]
pub struct Dispatcher<D, P, E> {
    connector: CanConnector<D>,
    registry: CommunicationList,
    recent: RecentCalls,
    postman: P,
    env: E,
}

impl<D, P, E> Dispatcher<D, P, E>
where
    D: CanDriver,
    P: Postman,
    E: Environment,
{
    /// Create a dispatcher for the node whose components `postman` knows.
    pub fn new(driver: D, postman: P, env: E, config: DispatcherConfig) -> Self {
        Self {
            connector: CanConnector::new(driver, &config),
            registry: CommunicationList::new(&config),
            recent: RecentCalls::new(&config),
            postman,
            env,
        }
    }

    /// Publish an event to every node, this one included.
    pub fn post_event(&mut self, header: Header, payload: Bytes) -> Result<(), PostError> {
        self.post(|outbox| outbox.post_event(header, payload))
    }

    /// Answer a call. Responses overtake everything already pending.
    pub fn post_response(&mut self, header: Header, payload: Bytes) -> Result<(), PostError> {
        self.post(|outbox| outbox.post_response(header, payload))
    }

    /// Answer a call negatively.
    pub fn post_negative_response(
        &mut self,
        header: Header,
        payload: Bytes,
    ) -> Result<(), PostError> {
        self.post(|outbox| outbox.post_negative_response(header, payload))
    }

    /// Call an action, ignoring any response.
    pub fn post_action_call(&mut self, header: Header, payload: Bytes) -> Result<(), PostError> {
        self.post(|outbox| outbox.post_action_call(header, payload))
    }

    /// Call an action and run `callback` when the response arrives.
    pub fn post_action_call_with_callback(
        &mut self,
        header: Header,
        payload: Bytes,
        callback: ResponseCallback,
    ) -> Result<(), PostError> {
        self.post(|outbox| outbox.post_action_call_with_callback(header, payload, callback))
    }

    /// Run one pass: receive, route, advance pending entries, send one frame.
    pub fn update(&mut self) {
        let now = self.env.now();

        self.connector.receive_frames();
        while let Some((header, payload)) = self.connector.receive_packet() {
            self.handle_packet(header, &payload, now);
        }

        self.registry.handle_waiting(now, &mut self.postman, &mut self.connector);
        self.connector.send_waiting();
    }

    /// Entries not yet delivered, acknowledged or answered.
    pub fn pending(&self) -> usize {
        self.registry.len()
    }

    /// Pending list.
    pub fn registry(&self) -> &CommunicationList {
        &self.registry
    }

    /// Frame-level backend.
    pub fn connector(&self) -> &CanConnector<D> {
        &self.connector
    }

    /// Frame-level backend, mutably.
    pub fn connector_mut(&mut self) -> &mut CanConnector<D> {
        &mut self.connector
    }

    /// Local delivery target.
    pub fn postman(&self) -> &P {
        &self.postman
    }

    /// Local delivery target, mutably.
    pub fn postman_mut(&mut self) -> &mut P {
        &mut self.postman
    }

    /// Time source.
    pub fn env(&self) -> &E {
        &self.env
    }

    fn post(
        &mut self,
        post: impl FnOnce(&mut Outbox) -> Result<(), PostError>,
    ) -> Result<(), PostError> {
        let mut outbox = Outbox::new();
        post(&mut outbox)?;
        self.registry.merge(&mut outbox);
        Ok(())
    }

    fn handle_packet(&mut self, header: Header, payload: &Bytes, now: Tick) {
        trace!(
            source = header.source,
            destination = header.destination,
            stream_id = header.stream_id,
            kind = ?header.kind,
            acknowledge = header.acknowledge,
            "packet received"
        );

        if header.acknowledge {
            if !self.registry.handle_acknowledge(&header) {
                debug!(?header, "acknowledgment matches nothing pending");
            }
            return;
        }

        let mut outbox = Outbox::new();
        match header.kind {
            PacketKind::Request if header.is_event() => {
                self.deliver(&header, payload, &mut outbox);
            },
            PacketKind::Request => {
                if self.postman.is_component_available(&header) {
                    if self.recent.first_delivery(&header, payload, now) {
                        self.deliver(&header, payload, &mut outbox);
                    } else {
                        debug!(?header, "retransmitted call, acknowledging again");
                    }
                    self.acknowledge(&header);
                }
            },
            PacketKind::Response | PacketKind::NegativeResponse => {
                match self.registry.take_response_match(&header) {
                    Some(mut call) => {
                        call.respond(&header, payload, &mut outbox);
                    },
                    None => debug!(
                        source = header.source,
                        destination = header.destination,
                        stream_id = header.stream_id,
                        "response matches no pending call"
                    ),
                }
                if self.postman.is_component_available(&header) {
                    self.acknowledge(&header);
                }
            },
        }
        self.registry.merge(&mut outbox);
    }

    fn deliver(&mut self, header: &Header, payload: &Bytes, outbox: &mut Outbox) {
        if let Err(err) = self.postman.deliver_packet(header, payload, outbox) {
            warn!(?header, %err, "local delivery failed");
        }
    }

    fn acknowledge(&mut self, header: &Header) {
        if let Err(err) = self.connector.send_packet(header.acknowledgment(), Bytes::new()) {
            warn!(?header, %err, "acknowledgment not sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use canlink_proto::{CanFrame, Reassembler, encode_packet};

    use super::*;
    use crate::{error::DeliveryError, registry::EntryState};

    #[derive(Default)]
    struct Wire {
        rx: VecDeque<CanFrame>,
        tx: Vec<CanFrame>,
    }

    impl CanDriver for Wire {
        fn is_frame_available(&self) -> bool {
            !self.rx.is_empty()
        }

        fn receive_frame(&mut self) -> Option<CanFrame> {
            self.rx.pop_front()
        }

        fn can_send(&self) -> bool {
            true
        }

        fn send_frame(&mut self, frame: &CanFrame) -> bool {
            self.tx.push(*frame);
            true
        }
    }

    /// Component 1 lives here.
    #[derive(Default)]
    struct One {
        delivered: Vec<(Header, Bytes)>,
    }

    impl Postman for One {
        fn is_component_available(&self, header: &Header) -> bool {
            header.destination == 1
        }

        fn deliver_packet(
            &mut self,
            header: &Header,
            payload: &Bytes,
            _outbox: &mut Outbox,
        ) -> Result<(), DeliveryError> {
            self.delivered.push((*header, payload.clone()));
            Ok(())
        }
    }

    struct Fixed;

    impl Environment for Fixed {
        fn now(&self) -> Tick {
            Tick(0)
        }
    }

    fn dispatcher() -> Dispatcher<Wire, One, Fixed> {
        Dispatcher::new(Wire::default(), One::default(), Fixed, DispatcherConfig::default())
    }

    fn inject(dispatcher: &mut Dispatcher<Wire, One, Fixed>, header: Header, payload: &[u8]) {
        let frames = encode_packet(header, Bytes::copy_from_slice(payload)).unwrap();
        dispatcher.connector_mut().driver_mut().rx.extend(frames);
    }

    fn sent_packets(dispatcher: &Dispatcher<Wire, One, Fixed>) -> Vec<Header> {
        let mut reassembler = Reassembler::default();
        dispatcher
            .connector()
            .driver()
            .tx
            .iter()
            .filter_map(|frame| reassembler.push(frame).unwrap())
            .map(|(header, _)| header)
            .collect()
    }

    #[test]
    fn remote_call_delivered_and_acknowledged() {
        let mut dispatcher = dispatcher();
        let call = Header::request(7, 1, 4);
        inject(&mut dispatcher, call, b"args");

        dispatcher.update();

        assert_eq!(dispatcher.postman().delivered, vec![(call, Bytes::from_static(b"args"))]);
        assert_eq!(sent_packets(&dispatcher), vec![call.acknowledgment()]);
    }

    #[test]
    fn retransmitted_call_acknowledged_not_redelivered() {
        let mut dispatcher = dispatcher();
        let call = Header::request(7, 1, 4);
        inject(&mut dispatcher, call, b"args");
        dispatcher.update();

        // The acknowledgment was lost and the sender tries again.
        inject(&mut dispatcher, call, b"args");
        dispatcher.update();

        assert_eq!(dispatcher.postman().delivered, vec![(call, Bytes::from_static(b"args"))]);
        assert_eq!(sent_packets(&dispatcher), vec![call.acknowledgment(), call.acknowledgment()]);
    }

    #[test]
    fn same_stream_new_payload_delivered() {
        let mut dispatcher = dispatcher();
        let call = Header::request(7, 1, 4);
        inject(&mut dispatcher, call, b"one");
        inject(&mut dispatcher, call, b"two");

        dispatcher.update();

        assert_eq!(dispatcher.postman().delivered.len(), 2);
    }

    #[test]
    fn call_for_other_node_ignored() {
        let mut dispatcher = dispatcher();
        inject(&mut dispatcher, Header::request(7, 2, 4), b"");

        dispatcher.update();

        assert!(dispatcher.postman().delivered.is_empty());
        assert!(dispatcher.connector().driver().tx.is_empty());
    }

    #[test]
    fn remote_event_delivered_without_ack() {
        let mut dispatcher = dispatcher();
        inject(&mut dispatcher, Header::event(7, 4), b"tick");

        dispatcher.update();

        assert_eq!(dispatcher.postman().delivered.len(), 1);
        assert!(dispatcher.connector().driver().tx.is_empty());
    }

    #[test]
    fn ack_then_response_closes_call() {
        let mut dispatcher = dispatcher();
        let call = Header::request(1, 9, 4);
        let hits = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = hits.clone();
        dispatcher
            .post_action_call_with_callback(
                call,
                Bytes::new(),
                ResponseCallback::new(move |message: &crate::ResponseMessage<'_>, _: &mut Outbox| {
                    seen.lock().push(message.payload.clone());
                }),
            )
            .unwrap();

        dispatcher.update();
        assert_eq!(dispatcher.registry().iter().next().unwrap().state(), EntryState::WaitForAck);

        inject(&mut dispatcher, call.acknowledgment(), b"");
        dispatcher.update();
        assert_eq!(dispatcher.registry().iter().next().unwrap().state(), EntryState::WaitForResponse);

        let response = call.reply(PacketKind::Response);
        inject(&mut dispatcher, response, b"done");
        dispatcher.update();

        assert_eq!(*hits.lock(), vec![Bytes::from_static(b"done")]);
        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(sent_packets(&dispatcher), vec![call, response.acknowledgment()]);
    }

    #[test]
    fn response_before_ack_still_matches() {
        let mut dispatcher = dispatcher();
        let call = Header::request(1, 9, 4);
        dispatcher.post_action_call(call, Bytes::new()).unwrap();
        dispatcher.update();

        inject(&mut dispatcher, call.reply(PacketKind::NegativeResponse), b"");
        dispatcher.update();

        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn stray_response_acknowledged() {
        let mut dispatcher = dispatcher();
        let response = Header::request(1, 9, 4).reply(PacketKind::Response);
        inject(&mut dispatcher, response, b"");

        dispatcher.update();

        assert_eq!(sent_packets(&dispatcher), vec![response.acknowledgment()]);
    }
}
