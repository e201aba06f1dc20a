//! Deterministic simulation harness for canlink.
//!
//! Several [`canlink_core::Dispatcher`]s share one simulated bus and one
//! manual clock. Nothing runs on its own: a test advances the world one tick
//! at a time, so every run with the same seed produces the same frames.
//!
//! - [`SimEnv`]: shared tick counter
//! - [`SimBus`] / [`SimPort`]: broadcast bus with seeded frame loss and
//!   duplication
//! - [`ComponentTable`]: postman with scripted components
//! - [`SimNetwork`]: nodes, bus and clock stepped together

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod components;
pub mod network;
pub mod sim_bus;
pub mod sim_env;

pub use components::{ComponentTable, Delivery};
pub use network::{SimNetwork, SimNode};
pub use sim_bus::{BusStats, FaultConfig, SimBus, SimPort};
pub use sim_env::SimEnv;
