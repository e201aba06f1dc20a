//! Nodes, bus and clock stepped together.

use canlink_core::{Dispatcher, DispatcherConfig};

use crate::{ComponentTable, SimBus, SimEnv, SimPort, sim_bus::FaultConfig};

/// Dispatcher wired to the simulation.
pub type SimNode = Dispatcher<SimPort, ComponentTable, SimEnv>;

/// A bus with any number of nodes sharing one clock.
#[derive(Debug)]
pub struct SimNetwork {
    bus: SimBus,
    env: SimEnv,
    nodes: Vec<SimNode>,
    config: DispatcherConfig,
}

impl SimNetwork {
    /// Fault-free network.
    pub fn new(seed: u64) -> Self {
        Self::with_faults(seed, FaultConfig::NONE)
    }

    /// Network whose bus injects random faults.
    pub fn with_faults(seed: u64, faults: FaultConfig) -> Self {
        Self {
            bus: SimBus::with_faults(seed, faults),
            env: SimEnv::new(),
            nodes: Vec::new(),
            config: DispatcherConfig::default(),
        }
    }

    /// Configuration used for nodes added from now on.
    #[must_use]
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a node hosting `components`. Returns its index.
    pub fn add_node(&mut self, components: ComponentTable) -> usize {
        let node =
            Dispatcher::new(self.bus.port(), components, self.env.clone(), self.config.clone());
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// The bus.
    pub fn bus(&self) -> &SimBus {
        &self.bus
    }

    /// The shared clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Node by index.
    pub fn node(&self, index: usize) -> Option<&SimNode> {
        self.nodes.get(index)
    }

    /// Node by index, mutably.
    pub fn node_mut(&mut self, index: usize) -> Option<&mut SimNode> {
        self.nodes.get_mut(index)
    }

    /// Update every node once, in index order, then advance the clock one
    /// tick.
    pub fn step(&mut self) {
        for node in &mut self.nodes {
            node.update();
        }
        self.env.advance(1);
    }

    /// Step `ticks` times.
    pub fn run(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Step until `done` holds or `max_ticks` have passed. Returns whether
    /// `done` held.
    pub fn run_until(&mut self, max_ticks: u32, mut done: impl FnMut(&Self) -> bool) -> bool {
        for _ in 0..max_ticks {
            if done(self) {
                return true;
            }
            self.step();
        }
        done(self)
    }

    /// No node has anything pending or queued.
    pub fn is_idle(&self) -> bool {
        self.nodes.iter().all(|node| {
            node.pending() == 0
                && node.connector().queued_packets() == 0
                && node.connector().driver().pending_frames() == 0
        })
    }
}
