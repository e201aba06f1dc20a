//! Dispatcher configuration.

use canlink_proto::Reassembler;

/// Tunables for a [`crate::Dispatcher`].
///
/// The defaults are the protocol's fixed values; change them only when every
/// node on the bus agrees, or for tests.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Ticks a remote send waits for its acknowledgment before retrying
    pub ack_timeout: u32,
    /// Retransmissions before a send is abandoned
    pub max_retries: u8,
    /// Packets that may be in reassembly at once
    pub reassembly_capacity: usize,
    /// Packets that may wait in the connector for a free driver slot
    pub send_queue_capacity: usize,
    /// Ticks a delivered call is remembered, so a retransmission of it is
    /// acknowledged without a second delivery. Covers a sender's whole retry
    /// series at the default timeout.
    pub duplicate_window: u32,
    /// Delivered calls remembered at once
    pub duplicate_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            ack_timeout: 100,
            max_retries: 2,
            reassembly_capacity: Reassembler::DEFAULT_CAPACITY,
            send_queue_capacity: 32,
            duplicate_window: 500,
            duplicate_capacity: 16,
        }
    }
}
