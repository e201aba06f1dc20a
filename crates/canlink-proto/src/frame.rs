//! A single CAN frame.

use crate::{
    errors::{ProtocolError, Result},
    identifier::MAX_IDENTIFIER,
};

/// Maximum data bytes in one frame.
pub const MAX_FRAME_DATA: usize = 8;

/// One extended-identifier CAN frame as handed to or received from a driver.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CanFrame {
    identifier: u32,
    data: [u8; MAX_FRAME_DATA],
    length: u8,
}

impl CanFrame {
    /// Build a frame, validating identifier width and data length.
    pub fn new(identifier: u32, data: &[u8]) -> Result<Self> {
        if identifier > MAX_IDENTIFIER {
            return Err(ProtocolError::IdentifierOutOfRange(identifier));
        }
        if data.len() > MAX_FRAME_DATA {
            return Err(ProtocolError::FrameTooLong { len: data.len() });
        }

        let mut buf = [0u8; MAX_FRAME_DATA];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self { identifier, data: buf, length: data.len() as u8 })
    }

    /// Frame from parts the caller already bounded.
    pub(crate) fn from_valid(identifier: u32, data: &[u8]) -> Self {
        debug_assert!(identifier <= MAX_IDENTIFIER && data.len() <= MAX_FRAME_DATA);

        let len = data.len().min(MAX_FRAME_DATA);
        let mut buf = [0u8; MAX_FRAME_DATA];
        buf[..len].copy_from_slice(&data[..len]);
        Self { identifier: identifier & MAX_IDENTIFIER, data: buf, length: len as u8 }
    }

    /// 29-bit identifier.
    pub fn identifier(&self) -> u32 {
        self.identifier
    }

    /// Data bytes actually carried.
    pub fn data(&self) -> &[u8] {
        &self.data[..usize::from(self.length)]
    }

    /// Number of data bytes.
    pub fn len(&self) -> usize {
        usize::from(self.length)
    }

    /// Frame carries no data bytes.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl std::fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanFrame")
            .field("identifier", &format_args!("{:#010x}", self.identifier))
            .field("data", &self.data())
            .finish()
    }
}
