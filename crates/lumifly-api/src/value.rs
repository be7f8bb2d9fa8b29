// ── Field values ──
//
// Devices declare a native data type per node. Writes must use exactly that
// type, so every value carries its type tag and integer inputs are converted
// with range checks instead of casts.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Largest integer magnitude an `f32` represents exactly (2^24).
const F32_EXACT: i64 = 1 << 24;
/// Largest integer magnitude an `f64` represents exactly (2^53).
const F64_EXACT: i64 = 1 << 53;

/// Conversion failure from a controller-side integer into a device type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("value {value} does not fit in {ty}")]
    OutOfRange { value: i64, ty: FieldType },

    #[error("{ty} is not a numeric type")]
    NotNumeric { ty: FieldType },
}

/// Native data type of a device field (OPC-UA built-in scalar types).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum FieldType {
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Boolean)
    }

    /// Zero value of this type (dummy server defaults).
    pub fn zero(self) -> FieldValue {
        match self {
            Self::Boolean => FieldValue::Boolean(false),
            Self::SByte => FieldValue::SByte(0),
            Self::Byte => FieldValue::Byte(0),
            Self::Int16 => FieldValue::Int16(0),
            Self::UInt16 => FieldValue::UInt16(0),
            Self::Int32 => FieldValue::Int32(0),
            Self::UInt32 => FieldValue::UInt32(0),
            Self::Int64 => FieldValue::Int64(0),
            Self::UInt64 => FieldValue::UInt64(0),
            Self::Float => FieldValue::Float(0.0),
            Self::Double => FieldValue::Double(0.0),
        }
    }
}

/// A typed scalar read from or written to a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Boolean(_) => FieldType::Boolean,
            Self::SByte(_) => FieldType::SByte,
            Self::Byte(_) => FieldType::Byte,
            Self::Int16(_) => FieldType::Int16,
            Self::UInt16(_) => FieldType::UInt16,
            Self::Int32(_) => FieldType::Int32,
            Self::UInt32(_) => FieldType::UInt32,
            Self::Int64(_) => FieldType::Int64,
            Self::UInt64(_) => FieldType::UInt64,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.field_type().is_numeric()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view for reporting. Large 64-bit integers may lose precision.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Boolean(_) => None,
            Self::SByte(v) => Some(f64::from(v)),
            Self::Byte(v) => Some(f64::from(v)),
            Self::Int16(v) => Some(f64::from(v)),
            Self::UInt16(v) => Some(f64::from(v)),
            Self::Int32(v) => Some(f64::from(v)),
            Self::UInt32(v) => Some(f64::from(v)),
            Self::Int64(v) => Some(v as f64),
            Self::UInt64(v) => Some(v as f64),
            Self::Float(v) => Some(f64::from(v)),
            Self::Double(v) => Some(v),
        }
    }

    /// Convert an integer into `ty` without truncation.
    ///
    /// Fails when the value does not fit the target width or when `ty` is
    /// not numeric. Floating targets accept only integers they can hold
    /// exactly.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn from_integer(value: i64, ty: FieldType) -> Result<Self, ValueError> {
        let out_of_range = || ValueError::OutOfRange { value, ty };
        Ok(match ty {
            FieldType::Boolean => return Err(ValueError::NotNumeric { ty }),
            FieldType::SByte => Self::SByte(i8::try_from(value).map_err(|_| out_of_range())?),
            FieldType::Byte => Self::Byte(u8::try_from(value).map_err(|_| out_of_range())?),
            FieldType::Int16 => Self::Int16(i16::try_from(value).map_err(|_| out_of_range())?),
            FieldType::UInt16 => Self::UInt16(u16::try_from(value).map_err(|_| out_of_range())?),
            FieldType::Int32 => Self::Int32(i32::try_from(value).map_err(|_| out_of_range())?),
            FieldType::UInt32 => Self::UInt32(u32::try_from(value).map_err(|_| out_of_range())?),
            FieldType::Int64 => Self::Int64(value),
            FieldType::UInt64 => Self::UInt64(u64::try_from(value).map_err(|_| out_of_range())?),
            FieldType::Float if value.unsigned_abs() <= F32_EXACT.unsigned_abs() => {
                Self::Float(value as f32)
            }
            FieldType::Double if value.unsigned_abs() <= F64_EXACT.unsigned_abs() => {
                Self::Double(value as f64)
            }
            FieldType::Float | FieldType::Double => return Err(out_of_range()),
        })
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_conversion_respects_native_width() {
        assert_eq!(
            FieldValue::from_integer(10_000, FieldType::UInt16),
            Ok(FieldValue::UInt16(10_000))
        );
        assert_eq!(
            FieldValue::from_integer(10_000, FieldType::Double),
            Ok(FieldValue::Double(10_000.0))
        );
        assert_eq!(
            FieldValue::from_integer(5_000, FieldType::Byte),
            Err(ValueError::OutOfRange {
                value: 5_000,
                ty: FieldType::Byte
            })
        );
        assert_eq!(
            FieldValue::from_integer(-1, FieldType::UInt32),
            Err(ValueError::OutOfRange {
                value: -1,
                ty: FieldType::UInt32
            })
        );
    }

    #[test]
    fn boolean_is_not_a_dimmer_representation() {
        assert_eq!(
            FieldValue::from_integer(1, FieldType::Boolean),
            Err(ValueError::NotNumeric {
                ty: FieldType::Boolean
            })
        );
    }

    #[test]
    fn floats_only_accept_exact_integers() {
        assert!(FieldValue::from_integer(F32_EXACT, FieldType::Float).is_ok());
        assert!(FieldValue::from_integer(F32_EXACT + 1, FieldType::Float).is_err());
    }

    #[test]
    fn type_names_round_trip_through_strum() {
        assert_eq!(FieldType::UInt16.to_string(), "UInt16");
        assert_eq!("Double".parse::<FieldType>(), Ok(FieldType::Double));
    }

    #[test]
    fn numeric_view_and_display() {
        assert_eq!(FieldValue::UInt16(7000).as_f64(), Some(7000.0));
        assert_eq!(FieldValue::Boolean(true).as_f64(), None);
        assert_eq!(FieldValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(FieldValue::Int32(-3).to_string(), "-3");
    }
}
