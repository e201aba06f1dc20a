//! Single-bit control fields of the identifier.

use bitflags::bitflags;

bitflags! {
    /// The three control bits between the kind and the destination.
    ///
    /// Stored in identifier bits 24..=26; see [`crate::identifier`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlFlags: u8 {
        /// Frame is one fragment of a larger packet
        const FRAGMENT = 0b0000_0001;
        /// Message counter. Reserved, always sent as zero
        const COUNTER = 0b0000_0010;
        /// Packet acknowledges an earlier packet
        const ACKNOWLEDGE = 0b0000_0100;
    }
}

impl ControlFlags {
    /// Bit position of the lowest control bit in the identifier.
    pub const SHIFT: u32 = 24;

    /// Flags for an outgoing frame. The counter bit is never set.
    pub fn for_frame(acknowledge: bool, fragment: bool) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::ACKNOWLEDGE, acknowledge);
        flags.set(Self::FRAGMENT, fragment);
        flags
    }
}
