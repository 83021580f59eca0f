/*!
Two-phase key read.

Phase 1 asks the controller for the key's size and data type. Phase 2 is a
fresh request built from the key and that size, and returns the bytes.
Each phase is a self-contained exchange: a failure in either is returned
as-is and nothing needs rolling back.
*/

use tracing::debug;

use crate::error::{Result, SmcError};
use crate::frame::{KeyDataFrame, KeyInfoBlock};
use crate::key::{SensorKey, TypeTag};
use crate::protocol::{result_code, KERNEL_INDEX_SMC, PAYLOAD_SIZE};
use crate::session::Session;

/// Size and type of a key, as reported by the metadata phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub size: u32,
    pub type_tag: TypeTag,
    pub attributes: u8,
}

impl From<&KeyInfoBlock> for KeyInfo {
    fn from(block: &KeyInfoBlock) -> Self {
        Self {
            size: block.data_size,
            type_tag: TypeTag::from_code(block.data_type),
            attributes: block.data_attributes,
        }
    }
}

/// Typed bytes of one key, only the first `size` of which are meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSensorValue {
    key: SensorKey,
    type_tag: TypeTag,
    size: u32,
    bytes: [u8; PAYLOAD_SIZE],
}

impl RawSensorValue {
    /// Build a value from a payload of at most 32 bytes
    pub fn new(key: SensorKey, type_tag: TypeTag, payload: &[u8]) -> Result<Self> {
        if payload.len() > PAYLOAD_SIZE {
            return Err(SmcError::InvalidDataSize(payload.len() as u32));
        }

        let mut bytes = [0u8; PAYLOAD_SIZE];
        bytes[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            key,
            type_tag,
            size: payload.len() as u32,
            bytes,
        })
    }

    pub fn key(&self) -> SensorKey {
        self.key
    }

    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// Declared size in bytes (0..=32)
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The meaningful bytes; trailing buffer contents are never exposed
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.size as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Session {
    /// Metadata phase: learn the key's size and data type
    pub fn read_key_info(&mut self, key: SensorKey) -> Result<KeyInfo> {
        let request = KeyDataFrame::read_key_info(key);
        let response = self.call(KERNEL_INDEX_SMC, &request)?;
        check_result(key, &response)?;

        let info = KeyInfo::from(&response.key_info);
        if info.size as usize > PAYLOAD_SIZE {
            return Err(SmcError::InvalidDataSize(info.size));
        }

        debug!(%key, size = info.size, type_tag = %info.type_tag, "Read key info");
        Ok(info)
    }

    /// Read a key's raw value with the metadata and data phases
    pub fn read_key(&mut self, key: SensorKey) -> Result<RawSensorValue> {
        let info = self.read_key_info(key)?;

        let request = KeyDataFrame::read_bytes(key, &info);
        let response = self.call(KERNEL_INDEX_SMC, &request)?;
        check_result(key, &response)?;

        let payload = &response.bytes[..info.size as usize];
        debug!(%key, bytes = ?payload, "Read key bytes");
        Ok(RawSensorValue {
            key,
            type_tag: info.type_tag,
            size: info.size,
            bytes: response.bytes,
        })
    }
}

/// Map the controller's result byte onto an error
fn check_result(key: SensorKey, response: &KeyDataFrame) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    match response.result {
        result_code::KEY_NOT_FOUND => Err(SmcError::KeyNotFound(key)),
        code => Err(SmcError::ControllerStatus(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command;
    use crate::transport::ScriptedTransport;

    const TC0P: SensorKey = SensorKey::from_bytes(*b"TC0P");

    fn session(transport: ScriptedTransport) -> Session {
        Session::with_transport(transport, None).unwrap()
    }

    #[test]
    fn test_read_key_phases_in_order() {
        let transport = ScriptedTransport::reading(TypeTag::SP78, &[0x2D, 0x00]);
        let log = transport.log();
        let mut session = session(transport);

        let value = session.read_key(TC0P).unwrap();
        assert_eq!(value.type_tag(), TypeTag::SP78);
        assert_eq!(value.size(), 2);
        assert_eq!(value.payload(), &[0x2D, 0x00]);

        assert_eq!(log.commands(), vec![command::READ_KEYINFO, command::READ_BYTES]);
        let calls = log.calls();
        assert!(calls.iter().all(|c| c.request.key == TC0P.code()));
        assert_eq!(calls[1].request.key_info.data_size, 2);
    }

    #[test]
    fn test_metadata_failure_skips_data_phase() {
        let transport = ScriptedTransport::new([Err(SmcError::CallFailed(-1))]);
        let log = transport.log();
        let mut session = session(transport);

        assert_eq!(session.read_key(TC0P), Err(SmcError::CallFailed(-1)));
        assert_eq!(log.commands(), vec![command::READ_KEYINFO]);
    }

    #[test]
    fn test_data_failure_propagates() {
        let transport = ScriptedTransport::new([
            Ok(KeyDataFrame::key_info_reply(2, TypeTag::SP78)),
            Err(SmcError::CallFailed(-2)),
        ]);
        let mut session = session(transport);

        assert_eq!(session.read_key(TC0P), Err(SmcError::CallFailed(-2)));
    }

    #[test]
    fn test_key_not_found() {
        let transport =
            ScriptedTransport::new([Ok(KeyDataFrame::status_reply(result_code::KEY_NOT_FOUND))]);
        let log = transport.log();
        let mut session = session(transport);

        assert_eq!(session.read_key(TC0P), Err(SmcError::KeyNotFound(TC0P)));
        assert_eq!(log.call_count(), 1);
    }

    #[test]
    fn test_other_controller_status() {
        let transport = ScriptedTransport::new([
            Ok(KeyDataFrame::key_info_reply(2, TypeTag::SP78)),
            Ok(KeyDataFrame::status_reply(0x85)),
        ]);
        let mut session = session(transport);

        assert_eq!(session.read_key(TC0P), Err(SmcError::ControllerStatus(0x85)));
    }

    #[test]
    fn test_oversized_declaration_rejected() {
        let transport =
            ScriptedTransport::new([Ok(KeyDataFrame::key_info_reply(64, TypeTag::UI8))]);
        let log = transport.log();
        let mut session = session(transport);

        assert_eq!(session.read_key(TC0P), Err(SmcError::InvalidDataSize(64)));
        assert_eq!(log.call_count(), 1);
    }

    #[test]
    fn test_trailing_bytes_hidden() {
        let transport = ScriptedTransport::new([
            Ok(KeyDataFrame::key_info_reply(1, TypeTag::UI8)),
            Ok(KeyDataFrame::bytes_reply(&[0x07, 0xEE, 0xEE])),
        ]);
        let mut session = session(transport);

        let value = session.read_key(TC0P).unwrap();
        assert_eq!(value.payload(), &[0x07]);
    }

    #[test]
    fn test_read_on_closed_session() {
        let transport = ScriptedTransport::reading(TypeTag::SP78, &[0x19, 0x00]);
        let log = transport.log();
        let mut session = session(transport);
        session.close().unwrap();

        assert_eq!(session.read_key(TC0P), Err(SmcError::SessionClosed));
        assert_eq!(log.call_count(), 0);
    }

    #[test]
    fn test_raw_value_rejects_oversized_payload() {
        assert_eq!(
            RawSensorValue::new(TC0P, TypeTag::UI8, &[0u8; 33]),
            Err(SmcError::InvalidDataSize(33))
        );
    }
}
