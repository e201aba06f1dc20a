//! Time source.
//!
//! Embedded tick counters wrap, so a [`Tick`] is only ever compared by the
//! distance to another tick, computed with wrapping subtraction.

use std::time::Instant;

/// Monotonic, wrapping tick counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tick(pub u32);

impl Tick {
    /// Ticks elapsed from `earlier` to `self`. Correct across one wrap.
    pub const fn since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// `self` advanced by `ticks`, wrapping.
    #[must_use]
    pub const fn add(self, ticks: u32) -> Self {
        Self(self.0.wrapping_add(ticks))
    }
}

/// Supplies the current tick.
///
/// Production code reads a hardware timer or [`SystemEnv`]; simulations
/// advance a shared counter by hand.
pub trait Environment {
    /// Current tick.
    fn now(&self) -> Tick;
}

/// Millisecond ticks since construction, from the OS monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemEnv {
    start: Instant,
}

impl SystemEnv {
    /// Start counting at zero now.
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Tick {
        // Truncation is the intended wrap.
        Tick(self.start.elapsed().as_millis() as u32)
    }
}
