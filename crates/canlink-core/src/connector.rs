//! Frame-level backend on top of a [`CanDriver`].
//!
//! Outgoing packets wait in a FIFO and leave one frame per
//! [`send_waiting`](CanConnector::send_waiting) call. Incoming frames are
//! reassembled into packets that the dispatcher drains with
//! [`receive_packet`](CanConnector::receive_packet).

use std::collections::VecDeque;

use bytes::Bytes;
use canlink_proto::{Fragmenter, Header, ProtocolError, Reassembler};
use tracing::{debug, trace, warn};

use crate::{config::DispatcherConfig, transport::CanDriver};

/// Where the registry sends packets bound for other nodes.
pub trait Backend {
    /// Queue a packet for transmission.
    ///
    /// Only an unencodable packet is an error. A packet that finds no room is
    /// dropped like a frame lost on the bus; acknowledged sends recover
    /// through retransmission.
    fn send_packet(&mut self, header: Header, payload: Bytes) -> Result<(), ProtocolError>;
}

/// Frame counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectorStats {
    /// Frames the driver accepted
    pub frames_sent: u64,
    /// Frames taken from the driver
    pub frames_received: u64,
    /// Received frames dropped as malformed
    pub frames_dropped: u64,
    /// Packets refused because the send queue was full
    pub packets_refused: u64,
}

/// Packet-level view of a CAN driver.
#[derive(Debug)]
pub struct CanConnector<D> {
    driver: D,
    send_queue: VecDeque<Fragmenter>,
    send_capacity: usize,
    reassembler: Reassembler,
    received: VecDeque<(Header, Bytes)>,
    stats: ConnectorStats,
}

impl<D: CanDriver> CanConnector<D> {
    /// Wrap `driver`.
    pub fn new(driver: D, config: &DispatcherConfig) -> Self {
        Self {
            driver,
            send_queue: VecDeque::new(),
            send_capacity: config.send_queue_capacity,
            reassembler: Reassembler::new(config.reassembly_capacity),
            received: VecDeque::new(),
            stats: ConnectorStats::default(),
        }
    }

    /// Underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Underlying driver, mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Counters.
    pub fn stats(&self) -> ConnectorStats {
        self.stats
    }

    /// Packets with frames still to send.
    pub fn queued_packets(&self) -> usize {
        self.send_queue.len()
    }

    /// Packets being reassembled.
    pub fn partial_packets(&self) -> usize {
        self.reassembler.in_progress()
    }

    /// Receive everything the driver has, then send one waiting frame.
    pub fn update(&mut self) {
        self.receive_frames();
        self.send_waiting();
    }

    /// A complete packet is ready.
    pub fn is_packet_available(&self) -> bool {
        !self.received.is_empty()
    }

    /// Take the oldest complete packet.
    pub fn receive_packet(&mut self) -> Option<(Header, Bytes)> {
        self.received.pop_front()
    }

    /// Drain the driver's receive side into the reassembler.
    pub fn receive_frames(&mut self) {
        while self.driver.is_frame_available() {
            let Some(frame) = self.driver.receive_frame() else {
                break;
            };
            self.stats.frames_received += 1;

            match self.reassembler.push(&frame) {
                Ok(Some(packet)) => self.received.push_back(packet),
                Ok(None) => {},
                Err(err) => {
                    self.stats.frames_dropped += 1;
                    warn!(?frame, %err, "dropping received frame");
                },
            }
        }
    }

    /// Hand the next waiting frame to the driver.
    ///
    /// A frame the driver refuses stays at the head of the queue.
    pub fn send_waiting(&mut self) {
        let Some(fragmenter) = self.send_queue.front_mut() else {
            return;
        };
        if !self.driver.can_send() {
            return;
        }
        let Some(frame) = fragmenter.peek() else {
            self.send_queue.pop_front();
            return;
        };

        if self.driver.send_frame(&frame) {
            self.stats.frames_sent += 1;
            fragmenter.advance();
            if fragmenter.is_finished() {
                trace!(header = ?fragmenter.header(), "packet sent");
                self.send_queue.pop_front();
            }
        }
    }
}

impl<D: CanDriver> Backend for CanConnector<D> {
    fn send_packet(&mut self, header: Header, payload: Bytes) -> Result<(), ProtocolError> {
        let fragmenter = Fragmenter::new(header, payload)?;

        // Single frames skip the queue when nothing is ahead of them.
        if self.send_queue.is_empty() && !fragmenter.is_fragmented() && self.driver.can_send() {
            if let Some(frame) = fragmenter.peek() {
                if self.driver.send_frame(&frame) {
                    self.stats.frames_sent += 1;
                    return Ok(());
                }
            }
        }

        if self.send_queue.len() >= self.send_capacity {
            self.stats.packets_refused += 1;
            warn!(?header, "send queue full, packet dropped");
            return Ok(());
        }

        debug!(?header, frames = fragmenter.frame_count(), "packet queued");
        self.send_queue.push_back(fragmenter);
        Ok(())
    }
}
