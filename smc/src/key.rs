/*!
Four-character key and data-type codec.

SMC keys and data types are both four ASCII bytes packed big-endian into a
`u32`: byte *i* of the text occupies bits `(3-i)*8 .. (3-i)*8+7`.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SmcError};

/// Pack four bytes into the wire `u32` (byte 0 in the high bits)
pub const fn pack_code(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// Unpack a wire `u32` into its four bytes (high bits first)
pub const fn unpack_code(code: u32) -> [u8; 4] {
    code.to_be_bytes()
}

/// Encode a four-character key into its wire representation
pub fn encode_key(text: &str) -> Result<u32> {
    Ok(text.parse::<SensorKey>()?.code())
}

/// Decode a data-type code returned by the controller
pub fn decode_type_tag(code: u32) -> TypeTag {
    TypeTag::from_code(code)
}

/// A four-character ASCII sensor key such as `TC0P`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SensorKey([u8; 4]);

impl SensorKey {
    /// Build a key from raw bytes; intended for compile-time constants
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Decode a key from its wire representation
    pub const fn from_code(code: u32) -> Self {
        Self(unpack_code(code))
    }

    /// The big-endian wire representation
    pub const fn code(&self) -> u32 {
        pack_code(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// The key's text, or `None` if a byte is outside ASCII
    ///
    /// Unlike `Display`, control characters are returned unescaped.
    pub fn as_str(&self) -> Option<&str> {
        if self.0.is_ascii() {
            std::str::from_utf8(&self.0).ok()
        } else {
            None
        }
    }
}

impl FromStr for SensorKey {
    type Err = SmcError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(ch) = s.chars().find(|c| !c.is_ascii()) {
            return Err(SmcError::InvalidKeyCharacter(ch));
        }

        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| SmcError::InvalidKeyLength(s.len()))?;

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for SensorKey {
    type Error = SmcError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SensorKey> for String {
    fn from(key: SensorKey) -> Self {
        match key.as_str() {
            Some(text) => text.to_string(),
            None => key.to_string(),
        }
    }
}

impl fmt::Display for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, &self.0)
    }
}

impl fmt::Debug for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensorKey(\"{}\")", self)
    }
}

/// The four-character name of a wire data type such as `sp78`
///
/// Tags come straight from the controller and may hold non-printable bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag([u8; 4]);

impl TypeTag {
    /// Signed 8.8 fixed point
    pub const SP78: Self = Self(*b"sp78");
    /// Unsigned 14.2 fixed point
    pub const FPE2: Self = Self(*b"fpe2");
    /// 32-bit float
    pub const FLT: Self = Self(*b"flt ");
    pub const UI8: Self = Self(*b"ui8 ");
    pub const UI16: Self = Self(*b"ui16");
    pub const UI32: Self = Self(*b"ui32");
    pub const FLAG: Self = Self(*b"flag");

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn from_code(code: u32) -> Self {
        Self(unpack_code(code))
    }

    pub const fn code(&self) -> u32 {
        pack_code(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// True if every byte is printable ASCII
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|b| (0x20..=0x7e).contains(b))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, &self.0)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag(\"{}\")", self)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, bytes: &[u8; 4]) -> fmt::Result {
    for &b in bytes {
        if (0x20..=0x7e).contains(&b) {
            write!(f, "{}", b as char)?;
        } else {
            write!(f, "\\x{:02x}", b)?;
        }
    }
    Ok(())
}
