//! Typed SQL scalar values.
//!
//! [`TypedValue`] is the closed set of values that can travel over the wire. Every value
//! carries its declared SQL type as a tag; the distinguished [`TypedValue::Null`] carries
//! nothing, so the declared type of a NULL is lost once it has been encoded.
//!
//! [`SqlValue`] is the open, runtime-typed side: what a host program binds as a parameter or
//! what the relational engine hands back for a cell. Conversion into a [`TypedValue`] is by
//! runtime type and fails for types that have no wire tag.
//!
//! # Date/time
//!
//! `DateTime` values are a signed count of 100-nanosecond ticks since
//! `0001-01-01T00:00:00`. Use [`TypedValue::from_datetime`] and [`TypedValue::as_datetime`]
//! to move between ticks and [`NaiveDateTime`]. The tick range covers roughly years -29225
//! to 29228; dates outside it are rejected rather than wrapped.
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;

/// Ticks per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;
/// Seconds between `0001-01-01T00:00:00` and the unix epoch.
const EPOCH_OFFSET_SECONDS: i64 = 62_135_596_800;

/// Wire tag of a [`TypedValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Null = 0,
    TinyInt = 1,
    SmallInt = 2,
    Int = 3,
    BigInt = 4,
    Real = 5,
    Float = 6,
    DateTime = 7,
    NVarChar = 8,
    VarBinary = 9,
}

impl TryFrom<u8> for TypeTag {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TypeTag::Null,
            1 => TypeTag::TinyInt,
            2 => TypeTag::SmallInt,
            3 => TypeTag::Int,
            4 => TypeTag::BigInt,
            5 => TypeTag::Real,
            6 => TypeTag::Float,
            7 => TypeTag::DateTime,
            8 => TypeTag::NVarChar,
            9 => TypeTag::VarBinary,
            other => return Err(other),
        })
    }
}

impl From<TypeTag> for u8 {
    fn from(value: TypeTag) -> Self {
        value as u8
    }
}

/// A SQL scalar tagged with its declared wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    TinyInt(u8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Float(f64),
    /// 100ns ticks since `0001-01-01T00:00:00`.
    DateTime(i64),
    NVarChar(String),
    VarBinary(Vec<u8>),
}

impl TypedValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            TypedValue::Null => TypeTag::Null,
            TypedValue::TinyInt(_) => TypeTag::TinyInt,
            TypedValue::SmallInt(_) => TypeTag::SmallInt,
            TypedValue::Int(_) => TypeTag::Int,
            TypedValue::BigInt(_) => TypeTag::BigInt,
            TypedValue::Real(_) => TypeTag::Real,
            TypedValue::Float(_) => TypeTag::Float,
            TypedValue::DateTime(_) => TypeTag::DateTime,
            TypedValue::NVarChar(_) => TypeTag::NVarChar,
            TypedValue::VarBinary(_) => TypeTag::VarBinary,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// Fails with [`ValueError::OutOfRange`] if `value` has no i64 tick count.
    pub fn from_datetime(value: NaiveDateTime) -> Result<Self, ValueError> {
        let utc = value.and_utc();
        let seconds = i128::from(utc.timestamp()) + i128::from(EPOCH_OFFSET_SECONDS);
        let ticks = seconds * i128::from(TICKS_PER_SECOND)
            + i128::from(utc.timestamp_subsec_nanos() / 100);
        i64::try_from(ticks)
            .map(TypedValue::DateTime)
            .map_err(|_| ValueError::OutOfRange(value))
    }

    /// Returns `None` for non-DateTime values and for tick counts chrono cannot represent.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        let TypedValue::DateTime(ticks) = self else {
            return None;
        };
        let seconds = ticks.div_euclid(TICKS_PER_SECOND) - EPOCH_OFFSET_SECONDS;
        let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
        DateTime::from_timestamp(seconds, nanos).map(|dt| dt.naive_utc())
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => write!(f, "NULL"),
            TypedValue::TinyInt(v) => write!(f, "{v}"),
            TypedValue::SmallInt(v) => write!(f, "{v}"),
            TypedValue::Int(v) => write!(f, "{v}"),
            TypedValue::BigInt(v) => write!(f, "{v}"),
            TypedValue::Real(v) => write!(f, "{v}"),
            TypedValue::Float(v) => write!(f, "{v}"),
            TypedValue::DateTime(ticks) => match self.as_datetime() {
                Some(dt) => write!(f, "{dt}"),
                None => write!(f, "{ticks} ticks"),
            },
            TypedValue::NVarChar(v) => write!(f, "{v}"),
            TypedValue::VarBinary(v) => {
                write!(f, "0x")?;
                for byte in v {
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
        }
    }
}

macro_rules! typed_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for TypedValue {
                fn from(value: $source) -> Self {
                    TypedValue::$variant(value.into())
                }
            }
        )*
    };
}

typed_from! {
    u8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f32 => Real,
    f64 => Float,
    String => NVarChar,
    &str => NVarChar,
    Vec<u8> => VarBinary,
    &[u8] => VarBinary,
}

impl TryFrom<NaiveDateTime> for TypedValue {
    type Error = ValueError;

    fn try_from(value: NaiveDateTime) -> Result<Self, Self::Error> {
        TypedValue::from_datetime(value)
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(TypedValue::Null, Into::into)
    }
}

/// A runtime-typed value as produced by the relational engine or supplied by a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    DateTime(NaiveDateTime),
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
    /// Exact numeric kept in its textual form.
    Decimal(String),
    Guid([u8; 16]),
}

impl SqlValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Byte(_) => "u8",
            SqlValue::Int16(_) => "i16",
            SqlValue::Int32(_) => "i32",
            SqlValue::Int64(_) => "i64",
            SqlValue::Single(_) => "f32",
            SqlValue::Double(_) => "f64",
            SqlValue::DateTime(_) => "datetime",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Bool(_) => "bool",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Guid(_) => "guid",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("unsupported value type '{0}'")]
    Unsupported(&'static str),

    #[error("datetime {0} is outside the representable tick range")]
    OutOfRange(NaiveDateTime),
}

impl TryFrom<SqlValue> for TypedValue {
    type Error = ValueError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        Ok(match value {
            SqlValue::Null => TypedValue::Null,
            SqlValue::Int64(v) => TypedValue::BigInt(v),
            SqlValue::Bytes(v) => TypedValue::VarBinary(v),
            SqlValue::Text(v) => TypedValue::NVarChar(v),
            SqlValue::DateTime(v) => TypedValue::from_datetime(v)?,
            SqlValue::Double(v) => TypedValue::Float(v),
            SqlValue::Int32(v) => TypedValue::Int(v),
            SqlValue::Single(v) => TypedValue::Real(v),
            SqlValue::Int16(v) => TypedValue::SmallInt(v),
            SqlValue::Byte(v) => TypedValue::TinyInt(v),
            other => return Err(ValueError::Unsupported(other.type_name())),
        })
    }
}

impl From<TypedValue> for SqlValue {
    fn from(value: TypedValue) -> Self {
        match value {
            TypedValue::Null => SqlValue::Null,
            TypedValue::TinyInt(v) => SqlValue::Byte(v),
            TypedValue::SmallInt(v) => SqlValue::Int16(v),
            TypedValue::Int(v) => SqlValue::Int32(v),
            TypedValue::BigInt(v) => SqlValue::Int64(v),
            TypedValue::Real(v) => SqlValue::Single(v),
            TypedValue::Float(v) => SqlValue::Double(v),
            TypedValue::DateTime(ticks) => match TypedValue::DateTime(ticks).as_datetime() {
                Some(v) => SqlValue::DateTime(v),
                None => SqlValue::Int64(ticks),
            },
            TypedValue::NVarChar(v) => SqlValue::Text(v),
            TypedValue::VarBinary(v) => SqlValue::Bytes(v),
        }
    }
}
