//! Big-endian framing primitives and the [`TypedValue`] codec.
//!
//! Fixed-width integers and floats are written through `bincode` configured for big-endian,
//! fixed-size integers, so an `i32` is always exactly four bytes in network order. Strings and
//! byte arrays carry an explicit length prefix (`u32`, or `u8` for column names) followed by
//! the raw bytes.
use std::io::{self, Cursor, Read, Write};

use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint},
    decode_from_std_read, encode_into_std_write,
};
use thiserror::Error;

use crate::value::{TypeTag, TypedValue};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),

    #[error("failed to encode field: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode field: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("frame IO error: {0}")]
    Io(#[from] io::Error),

    #[error("truncated {field}: expected {expected} bytes, got {actual}")]
    Truncated {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid UTF-8 in {0}")]
    Utf8(&'static str),

    #[error("{field} too long: {len} exceeds {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{0} unexpected trailing bytes")]
    Trailing(usize),

    #[error("response does not carry a {0} payload")]
    Unexpected(&'static str),
}

fn config() -> Configuration<BigEndian, Fixint> {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

/// Writes protocol fields to an underlying stream.
pub struct FrameWriter<W: Write> {
    stream: W,
    config: Configuration<BigEndian, Fixint>,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            config: config(),
        }
    }

    pub fn into_inner(self) -> W {
        self.stream
    }

    fn fixed<T: Encode>(&mut self, value: T) -> Result<(), CodecError> {
        encode_into_std_write(value, &mut self.stream, self.config)?;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.fixed(value)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.fixed(value)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.fixed(value)
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.stream.write_all(bytes)?;
        Ok(())
    }

    /// `u32` length followed by the bytes.
    pub fn write_bytes(&mut self, field: &'static str, bytes: &[u8]) -> Result<(), CodecError> {
        let len = u32::try_from(bytes.len()).map_err(|_| CodecError::TooLong {
            field,
            len: bytes.len(),
            max: u32::MAX as usize,
        })?;
        self.write_u32(len)?;
        self.write_raw(bytes)
    }

    pub fn write_str(&mut self, field: &'static str, value: &str) -> Result<(), CodecError> {
        self.write_bytes(field, value.as_bytes())
    }

    /// `u8` length followed by the UTF-8 bytes.
    pub fn write_short_str(&mut self, field: &'static str, value: &str) -> Result<(), CodecError> {
        let len = u8::try_from(value.len()).map_err(|_| CodecError::TooLong {
            field,
            len: value.len(),
            max: u8::MAX as usize,
        })?;
        self.write_u8(len)?;
        self.write_raw(value.as_bytes())
    }

    pub fn write_value(&mut self, value: &TypedValue) -> Result<(), CodecError> {
        self.write_u8(value.tag().into())?;
        match value {
            TypedValue::Null => Ok(()),
            TypedValue::TinyInt(v) => self.fixed(*v),
            TypedValue::SmallInt(v) => self.fixed(*v),
            TypedValue::Int(v) => self.fixed(*v),
            TypedValue::BigInt(v) => self.fixed(*v),
            TypedValue::Real(v) => self.fixed(*v),
            TypedValue::Float(v) => self.fixed(*v),
            TypedValue::DateTime(v) => self.fixed(*v),
            TypedValue::NVarChar(v) => self.write_str("nvarchar value", v),
            TypedValue::VarBinary(v) => self.write_bytes("varbinary value", v),
        }
    }
}

/// Reads protocol fields from an underlying stream.
pub struct FrameReader<R: Read> {
    stream: R,
    config: Configuration<BigEndian, Fixint>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            config: config(),
        }
    }

    fn fixed<T: Decode<()>>(&mut self) -> Result<T, CodecError> {
        Ok(decode_from_std_read(&mut self.stream, self.config)?)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.fixed()
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        self.fixed()
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.fixed()
    }

    pub fn read_raw(&mut self, field: &'static str, len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        (&mut self.stream).take(len as u64).read_to_end(&mut out)?;
        if out.len() != len {
            return Err(CodecError::Truncated {
                field,
                expected: len,
                actual: out.len(),
            });
        }
        Ok(out)
    }

    pub fn read_bytes(&mut self, field: &'static str) -> Result<Vec<u8>, CodecError> {
        let len = self.read_u32()? as usize;
        self.read_raw(field, len)
    }

    pub fn read_str(&mut self, field: &'static str) -> Result<String, CodecError> {
        let bytes = self.read_bytes(field)?;
        String::from_utf8(bytes).map_err(|_| CodecError::Utf8(field))
    }

    pub fn read_short_str(&mut self, field: &'static str) -> Result<String, CodecError> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_raw(field, len)?;
        String::from_utf8(bytes).map_err(|_| CodecError::Utf8(field))
    }

    pub fn read_value(&mut self) -> Result<TypedValue, CodecError> {
        let tag: TypeTag = self
            .read_u8()?
            .try_into()
            .map_err(CodecError::UnknownTag)?;

        Ok(match tag {
            TypeTag::Null => TypedValue::Null,
            TypeTag::TinyInt => TypedValue::TinyInt(self.fixed()?),
            TypeTag::SmallInt => TypedValue::SmallInt(self.fixed()?),
            TypeTag::Int => TypedValue::Int(self.fixed()?),
            TypeTag::BigInt => TypedValue::BigInt(self.fixed()?),
            TypeTag::Real => TypedValue::Real(self.fixed()?),
            TypeTag::Float => TypedValue::Float(self.fixed()?),
            TypeTag::DateTime => TypedValue::DateTime(self.fixed()?),
            TypeTag::NVarChar => TypedValue::NVarChar(self.read_str("nvarchar value")?),
            TypeTag::VarBinary => TypedValue::VarBinary(self.read_bytes("varbinary value")?),
        })
    }
}

impl FrameReader<Cursor<&[u8]>> {
    /// Fails if the buffer still holds unread bytes.
    pub fn finish(self) -> Result<(), CodecError> {
        let buf = self.stream.get_ref();
        let remaining = buf.len().saturating_sub(self.stream.position() as usize);
        if remaining > 0 {
            return Err(CodecError::Trailing(remaining));
        }
        Ok(())
    }
}

/// Encodes a single value: tag byte plus payload.
pub fn encode_value(value: &TypedValue) -> Result<Vec<u8>, CodecError> {
    let mut writer = FrameWriter::new(Vec::new());
    writer.write_value(value)?;
    Ok(writer.into_inner())
}

/// Decodes exactly one value from `bytes`.
pub fn decode_value(bytes: &[u8]) -> Result<TypedValue, CodecError> {
    let mut reader = FrameReader::new(Cursor::new(bytes));
    let value = reader.read_value()?;
    reader.finish()?;
    Ok(value)
}
