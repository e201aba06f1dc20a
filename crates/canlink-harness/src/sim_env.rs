//! Manual clock.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use canlink_core::{Environment, Tick};

/// Tick counter advanced by the test. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    now: Arc<AtomicU32>,
}

impl SimEnv {
    /// Clock at tick zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `start`, e.g. just before the counter wraps.
    pub fn starting_at(start: Tick) -> Self {
        Self { now: Arc::new(AtomicU32::new(start.0)) }
    }

    /// Move time forward, wrapping.
    pub fn advance(&self, ticks: u32) {
        // fetch_add wraps on overflow.
        self.now.fetch_add(ticks, Ordering::Relaxed);
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Tick {
        Tick(self.now.load(Ordering::Relaxed))
    }
}
