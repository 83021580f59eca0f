/*!
The fixed-size SMC request/response frame.

The same 80-byte structure travels in both directions for both phases of a
read. Field order and padding follow the kernel driver's C layout, so the
struct is passed to the platform call by pointer as-is.
*/

use crate::key::{SensorKey, TypeTag};
use crate::protocol::{command, result_code, PAYLOAD_SIZE};
use crate::reader::KeyInfo;

/// Firmware version block (unused by key reads)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionBlock {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
    pub reserved: u8,
    pub release: u16,
}

/// Power limit block (unused by key reads)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerLimitBlock {
    pub version: u16,
    pub length: u16,
    pub cpu_limit: u32,
    pub gpu_limit: u32,
    pub mem_limit: u32,
}

/// Key metadata block, filled in by the controller on a key-info request
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyInfoBlock {
    pub data_size: u32,
    pub data_type: u32,
    pub data_attributes: u8,
}

/// One SMC request or response frame
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyDataFrame {
    /// Encoded key, see [`SensorKey::code`]
    pub key: u32,
    pub version: VersionBlock,
    pub power_limits: PowerLimitBlock,
    pub key_info: KeyInfoBlock,
    /// Controller result byte, zero on success
    pub result: u8,
    pub status: u8,
    /// Sub-command selecting the operation
    pub data8: u8,
    pub data32: u32,
    pub bytes: [u8; PAYLOAD_SIZE],
}

impl KeyDataFrame {
    /// Phase 1 request: ask for the key's size and type
    pub fn read_key_info(key: SensorKey) -> Self {
        Self {
            key: key.code(),
            data8: command::READ_KEYINFO,
            ..Self::default()
        }
    }

    /// Phase 2 request: fetch the key's value, sized by the phase 1 reply
    pub fn read_bytes(key: SensorKey, info: &KeyInfo) -> Self {
        Self {
            key: key.code(),
            key_info: KeyInfoBlock {
                data_size: info.size,
                ..KeyInfoBlock::default()
            },
            data8: command::READ_BYTES,
            ..Self::default()
        }
    }

    /// Build a key-info response; used by transports that synthesize replies
    pub fn key_info_reply(data_size: u32, data_type: TypeTag) -> Self {
        Self {
            key_info: KeyInfoBlock {
                data_size,
                data_type: data_type.code(),
                data_attributes: 0,
            },
            ..Self::default()
        }
    }

    /// Build a read-bytes response carrying `payload` (truncated to 32 bytes)
    pub fn bytes_reply(payload: &[u8]) -> Self {
        let mut bytes = [0u8; PAYLOAD_SIZE];
        let len = payload.len().min(PAYLOAD_SIZE);
        bytes[..len].copy_from_slice(&payload[..len]);
        Self {
            bytes,
            ..Self::default()
        }
    }

    /// Build a response whose controller result byte is `code`
    pub fn status_reply(code: u8) -> Self {
        Self {
            result: code,
            ..Self::default()
        }
    }

    pub fn sensor_key(&self) -> SensorKey {
        SensorKey::from_code(self.key)
    }

    pub fn type_tag(&self) -> TypeTag {
        TypeTag::from_code(self.key_info.data_type)
    }

    pub fn is_success(&self) -> bool {
        self.result == result_code::SUCCESS
    }
}
