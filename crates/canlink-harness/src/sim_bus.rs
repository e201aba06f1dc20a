//! Simulated CAN bus.
//!
//! A frame sent from one port appears in the receive queue of every other
//! port, never its own, the way a CAN controller does not receive what it
//! transmits. Faults apply per frame, to all receivers at once.

use std::sync::Arc;

use canlink_core::{CanDriver, FrameQueue};
use canlink_proto::CanFrame;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Receive queue depth of each port.
const PORT_QUEUE_CAPACITY: usize = 256;

/// Random fault rates, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaultConfig {
    /// Probability that a frame is lost
    pub drop_rate: f64,
    /// Probability that a delivered frame arrives twice
    pub duplicate_rate: f64,
}

impl FaultConfig {
    /// No faults.
    pub const NONE: Self = Self { drop_rate: 0.0, duplicate_rate: 0.0 };
}

/// Frame counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusStats {
    /// Frames put on the bus
    pub sent: u64,
    /// Frames lost to faults
    pub dropped: u64,
    /// Extra copies delivered
    pub duplicated: u64,
}

#[derive(Debug)]
struct Inner {
    ports: Vec<FrameQueue>,
    rng: ChaCha8Rng,
    faults: FaultConfig,
    drop_next: usize,
    stats: BusStats,
}

/// Shared broadcast medium. Clones refer to the same bus.
#[derive(Debug, Clone)]
pub struct SimBus {
    inner: Arc<Mutex<Inner>>,
}

impl SimBus {
    /// Fault-free bus.
    pub fn new(seed: u64) -> Self {
        Self::with_faults(seed, FaultConfig::NONE)
    }

    /// Bus with random faults drawn from a generator seeded with `seed`.
    pub fn with_faults(seed: u64, faults: FaultConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                ports: Vec::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
                faults,
                drop_next: 0,
                stats: BusStats::default(),
            })),
        }
    }

    /// Attach a new node.
    pub fn port(&self) -> SimPort {
        let rx = FrameQueue::new(PORT_QUEUE_CAPACITY);
        let mut inner = self.inner.lock();
        let id = inner.ports.len();
        inner.ports.push(rx.clone());
        SimPort { id, bus: self.clone(), rx }
    }

    /// Lose the next `count` frames sent by anyone.
    pub fn drop_next(&self, count: usize) {
        self.inner.lock().drop_next += count;
    }

    /// Replace the random fault rates.
    pub fn set_faults(&self, faults: FaultConfig) {
        self.inner.lock().faults = faults;
    }

    /// Counters.
    pub fn stats(&self) -> BusStats {
        self.inner.lock().stats
    }

    fn broadcast(&self, sender: usize, frame: &CanFrame) {
        let mut inner = self.inner.lock();
        inner.stats.sent += 1;

        if inner.drop_next > 0 {
            inner.drop_next -= 1;
            inner.stats.dropped += 1;
            trace!(?frame, "frame dropped (scripted)");
            return;
        }

        let faults = inner.faults;
        if faults.drop_rate > 0.0 && inner.rng.gen_bool(faults.drop_rate) {
            inner.stats.dropped += 1;
            trace!(?frame, "frame dropped");
            return;
        }
        let copies = if faults.duplicate_rate > 0.0 && inner.rng.gen_bool(faults.duplicate_rate) {
            inner.stats.duplicated += 1;
            2
        } else {
            1
        };

        for (id, port) in inner.ports.iter().enumerate() {
            if id == sender {
                continue;
            }
            for _ in 0..copies {
                port.push(*frame);
            }
        }
    }
}

/// One node's connection to the bus.
#[derive(Debug, Clone)]
pub struct SimPort {
    id: usize,
    bus: SimBus,
    rx: FrameQueue,
}

impl SimPort {
    /// Position on the bus.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The bus this port is attached to.
    pub fn bus(&self) -> &SimBus {
        &self.bus
    }

    /// Frames received and not yet read.
    pub fn pending_frames(&self) -> usize {
        self.rx.len()
    }
}

impl CanDriver for SimPort {
    fn is_frame_available(&self) -> bool {
        !self.rx.is_empty()
    }

    fn receive_frame(&mut self) -> Option<CanFrame> {
        self.rx.pop()
    }

    fn can_send(&self) -> bool {
        true
    }

    fn send_frame(&mut self, frame: &CanFrame) -> bool {
        self.bus.broadcast(self.id, frame);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u8) -> CanFrame {
        CanFrame::new(u32::from(n), &[n]).unwrap()
    }

    #[test]
    fn sender_does_not_hear_itself() {
        let bus = SimBus::new(1);
        let mut a = bus.port();
        let mut b = bus.port();
        let mut c = bus.port();

        a.send_frame(&frame(1));

        assert!(!a.is_frame_available());
        assert_eq!(b.receive_frame(), Some(frame(1)));
        assert_eq!(c.receive_frame(), Some(frame(1)));
    }

    #[test]
    fn scripted_drop() {
        let bus = SimBus::new(1);
        let mut a = bus.port();
        let mut b = bus.port();

        bus.drop_next(1);
        a.send_frame(&frame(1));
        a.send_frame(&frame(2));

        assert_eq!(b.receive_frame(), Some(frame(2)));
        assert_eq!(bus.stats(), BusStats { sent: 2, dropped: 1, duplicated: 0 });
    }

    #[test]
    fn same_seed_same_faults() {
        let run = |seed| {
            let bus = SimBus::with_faults(seed, FaultConfig { drop_rate: 0.3, duplicate_rate: 0.3 });
            let mut a = bus.port();
            let mut b = bus.port();
            for n in 0..50 {
                a.send_frame(&frame(n));
            }
            std::iter::from_fn(|| b.receive_frame()).map(|f| f.data()[0]).collect::<Vec<_>>()
        };

        assert_eq!(run(7), run(7));
    }
}
