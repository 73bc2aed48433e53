use std::io::Cursor;

use crate::{error::Error, table::ResultTable};

use super::codec::{CodecError, FrameReader, FrameWriter};

/// Envelope code for success.
pub const SUCCESS: i32 = 0;
/// Size of a login challenge in bytes.
pub const CHALLENGE_LEN: usize = 32;

/// A failure as reported on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub code: i32,
    pub message: String,
    pub trace: String,
}

impl From<ErrorEnvelope> for Error {
    fn from(value: ErrorEnvelope) -> Self {
        Error::RemoteExecution {
            code: value.code,
            message: value.message,
            trace: value.trace,
        }
    }
}

/// Which success payload a request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Challenge,
    Ack,
    RowsAffected,
    Table,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Challenge([u8; CHALLENGE_LEN]),
    /// Success without payload (login, logout).
    Ack,
    RowsAffected(i32),
    Table(ResultTable),
    Err(ErrorEnvelope),
}

impl Response {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = FrameWriter::new(Vec::new());

        match self {
            Response::Err(envelope) => {
                writer.write_i32(envelope.code)?;
                writer.write_str("error message", &envelope.message)?;
                writer.write_str("error trace", &envelope.trace)?;
            }
            Response::Challenge(challenge) => {
                writer.write_i32(SUCCESS)?;
                writer.write_raw(challenge)?;
            }
            Response::Ack => writer.write_i32(SUCCESS)?,
            Response::RowsAffected(rows) => {
                writer.write_i32(SUCCESS)?;
                writer.write_i32(*rows)?;
            }
            Response::Table(table) => {
                writer.write_i32(SUCCESS)?;
                write_table(&mut writer, table)?;
            }
        }

        Ok(writer.into_inner())
    }

    pub fn decode(bytes: &[u8], kind: ResponseKind) -> Result<Self, CodecError> {
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let code = reader.read_i32()?;
        let response = if code != SUCCESS {
            Response::Err(ErrorEnvelope {
                code,
                message: reader.read_str("error message")?,
                trace: reader.read_str("error trace")?,
            })
        } else {
            match kind {
                ResponseKind::Challenge => {
                    let raw = reader.read_raw("challenge", CHALLENGE_LEN)?;
                    let mut challenge = [0; CHALLENGE_LEN];
                    challenge.copy_from_slice(&raw);
                    Response::Challenge(challenge)
                }
                ResponseKind::Ack => Response::Ack,
                ResponseKind::RowsAffected => Response::RowsAffected(reader.read_i32()?),
                ResponseKind::Table => Response::Table(read_table(&mut reader)?),
            }
        };

        reader.finish()?;
        Ok(response)
    }
}

fn write_table(writer: &mut FrameWriter<Vec<u8>>, table: &ResultTable) -> Result<(), CodecError> {
    let columns = u8::try_from(table.columns().len()).map_err(|_| CodecError::TooLong {
        field: "column count",
        len: table.columns().len(),
        max: u8::MAX as usize,
    })?;
    writer.write_u8(columns)?;
    for column in table.columns() {
        writer.write_short_str("column name", column)?;
    }

    let rows = u32::try_from(table.len()).map_err(|_| CodecError::TooLong {
        field: "row count",
        len: table.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_u32(rows)?;
    for row in table.rows() {
        for value in row {
            writer.write_value(value)?;
        }
    }
    Ok(())
}

fn read_table(reader: &mut FrameReader<Cursor<&[u8]>>) -> Result<ResultTable, CodecError> {
    let columns = reader.read_u8()? as usize;
    let names = (0..columns)
        .map(|_| reader.read_short_str("column name"))
        .collect::<Result<Vec<_>, _>>()?;

    let mut table = ResultTable::new(names);
    let rows = reader.read_u32()?;
    for _ in 0..rows {
        let row = (0..columns)
            .map(|_| reader.read_value())
            .collect::<Result<Vec<_>, _>>()?;
        table
            .push(row)
            .map_err(|_| CodecError::Unexpected("table row width"))?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use crate::value::TypedValue;

    use super::*;

    #[test]
    fn error_envelope_layout() {
        let bytes = Response::Err(ErrorEnvelope {
            code: -2,
            message: "no".into(),
            trace: "t".into(),
        })
        .encode()
        .unwrap();

        assert_eq!(
            bytes,
            vec![
                0xFF, 0xFF, 0xFF, 0xFE, 0, 0, 0, 2, b'n', b'o', 0, 0, 0, 1, b't'
            ]
        );
    }

    #[test]
    fn error_envelope_ignores_expected_kind() {
        let envelope = ErrorEnvelope {
            code: 547,
            message: "constraint".into(),
            trace: "at engine".into(),
        };
        let bytes = Response::Err(envelope.clone()).encode().unwrap();

        for kind in [
            ResponseKind::Challenge,
            ResponseKind::Ack,
            ResponseKind::RowsAffected,
            ResponseKind::Table,
        ] {
            assert_eq!(
                Response::decode(&bytes, kind).unwrap(),
                Response::Err(envelope.clone())
            );
        }
    }

    #[test]
    fn rows_affected_layout() {
        let bytes = Response::RowsAffected(3).encode().unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 3]);
    }

    #[test]
    fn challenge_is_raw_bytes() {
        let challenge = [7u8; CHALLENGE_LEN];
        let bytes = Response::Challenge(challenge).encode().unwrap();
        assert_eq!(bytes.len(), 4 + CHALLENGE_LEN);
        assert_eq!(
            Response::decode(&bytes, ResponseKind::Challenge).unwrap(),
            Response::Challenge(challenge)
        );
    }

    #[test]
    fn short_challenge_is_truncated() {
        let bytes = vec![0, 0, 0, 0, 1, 2, 3];
        assert!(matches!(
            Response::decode(&bytes, ResponseKind::Challenge),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn table_layout() {
        let mut table = ResultTable::new(vec!["a".into(), "b".into()]);
        table
            .push(vec![TypedValue::TinyInt(1), TypedValue::Null])
            .unwrap();
        let bytes = Response::Table(table.clone()).encode().unwrap();

        assert_eq!(
            bytes,
            vec![
                0, 0, 0, 0, // success
                2, 1, b'a', 1, b'b', // schema
                0, 0, 0, 1, // row count
                1, 1, 0, // cells
            ]
        );
        assert_eq!(
            Response::decode(&bytes, ResponseKind::Table).unwrap(),
            Response::Table(table)
        );
    }

    #[test]
    fn table_too_wide() {
        let columns = (0..256).map(|i| format!("c{i}")).collect();
        let table = ResultTable::new(columns);
        assert!(matches!(
            Response::Table(table).encode(),
            Err(CodecError::TooLong {
                field: "column count",
                ..
            })
        ));
    }
}
