/*!
Value decoding.

Dispatches on the value's [`TypeTag`]. Temperatures use the signed 8.8
fixed-point `sp78` format; [`decode_value`] additionally understands the
unsigned fixed-point, float and integer types the controller reports.
*/

use crate::error::{Result, SmcError};
use crate::key::TypeTag;
use crate::reader::RawSensorValue;

/// Fractional scaling for `sp78` (2^8)
pub const SP78_SCALE: f64 = 256.0;

/// Fractional scaling for `fpe2` (2^2)
pub const FPE2_SCALE: f64 = 4.0;

/// Data types with a known decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Signed 8.8 fixed point, big-endian
    Sp78,
    /// Unsigned 14.2 fixed point, big-endian
    Fpe2,
    /// IEEE 754 single precision, little-endian
    Flt,
    Ui8,
    Ui16,
    Ui32,
    Flag,
    Other(TypeTag),
}

impl DataType {
    /// Bytes needed to decode a value of this type
    pub fn payload_len(&self) -> Option<usize> {
        match self {
            Self::Ui8 | Self::Flag => Some(1),
            Self::Sp78 | Self::Fpe2 | Self::Ui16 => Some(2),
            Self::Flt | Self::Ui32 => Some(4),
            Self::Other(_) => None,
        }
    }
}

impl From<TypeTag> for DataType {
    fn from(tag: TypeTag) -> Self {
        match tag {
            TypeTag::SP78 => Self::Sp78,
            TypeTag::FPE2 => Self::Fpe2,
            TypeTag::FLT => Self::Flt,
            TypeTag::UI8 => Self::Ui8,
            TypeTag::UI16 => Self::Ui16,
            TypeTag::UI32 => Self::Ui32,
            TypeTag::FLAG => Self::Flag,
            other => Self::Other(other),
        }
    }
}

/// Convert `sp78` bytes (high byte signed, low byte fractional)
pub fn sp78_to_f64(bytes: [u8; 2]) -> f64 {
    i16::from_be_bytes(bytes) as f64 / SP78_SCALE
}

/// Convert `fpe2` bytes
pub fn fpe2_to_f64(bytes: [u8; 2]) -> f64 {
    u16::from_be_bytes(bytes) as f64 / FPE2_SCALE
}

/// Decode a temperature in degrees Celsius
///
/// Only `sp78` values are temperatures. Empty values yield
/// [`SmcError::NoData`], any other type [`SmcError::UnsupportedType`].
pub fn decode_temperature(value: &RawSensorValue) -> Result<f64> {
    if value.is_empty() {
        return Err(SmcError::NoData);
    }

    match DataType::from(value.type_tag()) {
        DataType::Sp78 => Ok(sp78_to_f64(leading(value)?)),
        _ => Err(SmcError::UnsupportedType(value.type_tag())),
    }
}

/// Decode any numeric value to an `f64`
pub fn decode_value(value: &RawSensorValue) -> Result<f64> {
    if value.is_empty() {
        return Err(SmcError::NoData);
    }

    let decoded = match DataType::from(value.type_tag()) {
        DataType::Sp78 => sp78_to_f64(leading(value)?),
        DataType::Fpe2 => fpe2_to_f64(leading(value)?),
        DataType::Flt => f32::from_le_bytes(leading(value)?) as f64,
        DataType::Ui8 | DataType::Flag => leading::<1>(value)?[0] as f64,
        DataType::Ui16 => u16::from_be_bytes(leading(value)?) as f64,
        DataType::Ui32 => u32::from_be_bytes(leading(value)?) as f64,
        DataType::Other(tag) => return Err(SmcError::UnsupportedType(tag)),
    };
    Ok(decoded)
}

/// The first `N` payload bytes
fn leading<const N: usize>(value: &RawSensorValue) -> Result<[u8; N]> {
    let payload = value.payload();
    payload
        .get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| SmcError::truncated(value.type_tag(), N, payload.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SensorKey;

    const KEY: SensorKey = SensorKey::from_bytes(*b"TC0P");

    fn value(tag: TypeTag, payload: &[u8]) -> RawSensorValue {
        RawSensorValue::new(KEY, tag, payload).unwrap()
    }

    #[test]
    fn test_sp78_whole_degrees() {
        assert_eq!(decode_temperature(&value(TypeTag::SP78, &[0x19, 0x00])), Ok(25.0));
        assert_eq!(decode_temperature(&value(TypeTag::SP78, &[0x2D, 0x00])), Ok(45.0));
    }

    #[test]
    fn test_sp78_negative_high_byte() {
        assert_eq!(decode_temperature(&value(TypeTag::SP78, &[0xFF, 0x00])), Ok(-1.0));
        assert_eq!(decode_temperature(&value(TypeTag::SP78, &[0xFF, 0x80])), Ok(-0.5));
    }

    #[test]
    fn test_sp78_fraction() {
        assert_eq!(sp78_to_f64([0x2D, 0x80]), 45.5);
        assert_eq!(sp78_to_f64([0x00, 0x40]), 0.25);
    }

    #[test]
    fn test_empty_value_is_no_data() {
        assert_eq!(decode_temperature(&value(TypeTag::SP78, &[])), Err(SmcError::NoData));
        assert_eq!(decode_value(&value(TypeTag::UI8, &[])), Err(SmcError::NoData));
    }

    #[test]
    fn test_non_temperature_type() {
        let err = decode_temperature(&value(TypeTag::FLT, &[0, 0, 0x2A, 0x42])).unwrap_err();
        assert_eq!(err, SmcError::UnsupportedType(TypeTag::FLT));
    }

    #[test]
    fn test_unprintable_tag_is_unsupported() {
        let tag = TypeTag::from_code(0x0001_02ff);
        assert_eq!(decode_value(&value(tag, &[1, 2])), Err(SmcError::UnsupportedType(tag)));
    }

    #[test]
    fn test_truncated_sp78() {
        assert_eq!(
            decode_temperature(&value(TypeTag::SP78, &[0x19])),
            Err(SmcError::truncated(TypeTag::SP78, 2, 1))
        );
    }

    #[test]
    fn test_decode_other_types() {
        assert_eq!(decode_value(&value(TypeTag::FPE2, &[0x1F, 0x40])), Ok(2000.0));
        assert_eq!(decode_value(&value(TypeTag::FLT, &42.5f32.to_le_bytes())), Ok(42.5));
        assert_eq!(decode_value(&value(TypeTag::UI8, &[0x07])), Ok(7.0));
        assert_eq!(decode_value(&value(TypeTag::UI16, &[0x01, 0x02])), Ok(258.0));
        assert_eq!(decode_value(&value(TypeTag::UI32, &[0, 1, 0, 0])), Ok(65536.0));
        assert_eq!(decode_value(&value(TypeTag::FLAG, &[0x01])), Ok(1.0));
    }

    #[test]
    fn test_payload_lengths() {
        assert_eq!(DataType::Sp78.payload_len(), Some(2));
        assert_eq!(DataType::Flt.payload_len(), Some(4));
        assert_eq!(DataType::Other(TypeTag::from_code(0)).payload_len(), None);
    }
}
