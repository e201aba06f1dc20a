//! canlink core logic
//!
//! The reliability and routing engine that turns a CAN-style bus (8-byte
//! frames, no delivery guarantees) into a small RPC and publish/subscribe
//! system.
//!
//! # Architecture
//!
//! Everything here is driven by one periodic call,
//! [`Dispatcher::update`], which runs a single cooperative pass:
//!
//! ```text
//!  driver ──frames──> CanConnector ──packets──> router ──> Postman (local)
//!                          ^                      │
//!                          │                      v
//!                          └──── frames ──── CommunicationList
//! ```
//!
//! 1. drain received frames and reassemble packets
//! 2. match each packet against pending calls, or hand it to the postman
//!    (once per call, however often it is retransmitted)
//! 3. advance every pending entry (deliver locally, transmit, retry, give up)
//! 4. push at most one outgoing frame into the driver
//!
//! No step blocks. Time comes from an [`Environment`] as a wrapping tick
//! counter. The only state shared with another execution context is the
//! [`FrameQueue`] a driver may fill from an interrupt.
//!
//! # Components
//!
//! - [`dispatcher`]: public API and inbound routing
//! - [`registry`]: pending-message list and its state machine
//! - [`connector`]: frame-level send queue and reassembly
//! - [`callback`]: response callbacks
//! - [`outbox`]: posts made while a pass is running
//! - [`postman`]: local delivery interface
//! - [`transport`]: CAN driver interface
//! - [`queue`]: lock-guarded frame queue for interrupt-fed drivers
//! - [`recent`]: calls already delivered, so retransmissions are not
//!   delivered twice
//! - [`mod@env`]: time
//! - [`config`]: tunables
//! - [`error`]: error types

pub mod callback;
pub mod config;
pub mod connector;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod outbox;
pub mod postman;
pub mod queue;
pub mod recent;
pub mod registry;
pub mod transport;

pub use callback::{ResponseCallback, ResponseHandler, ResponseMessage};
pub use config::DispatcherConfig;
pub use connector::{Backend, CanConnector, ConnectorStats};
pub use dispatcher::Dispatcher;
pub use env::{Environment, SystemEnv, Tick};
pub use error::{DeliveryError, PostError};
pub use outbox::Outbox;
pub use postman::Postman;
pub use queue::FrameQueue;
pub use recent::RecentCalls;
pub use registry::{CommunicationList, Entry, EntryState};
pub use transport::CanDriver;
