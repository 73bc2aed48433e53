use thiserror::Error;

use crate::protocol::{CodecError, TransportError};

/// Envelope code reported for transport failures.
pub const TRANSPORT_FAILURE: i32 = -1;
/// Envelope code reported for failures without an engine-native code.
pub const LOCAL_FAILURE: i32 = -2;

/// Errors surfaced by a [`Connection`](crate::Connection).
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed framing or an unknown type tag.
    #[error("protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The server answered with a non-zero envelope code.
    #[error("remote execution failed [{code}]: {message}")]
    RemoteExecution {
        code: i32,
        message: String,
        trace: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Illegal statement or transaction misuse, raised before any network call.
    #[error("usage error: {0}")]
    Usage(String),
}

impl Error {
    pub(crate) fn usage(reason: impl Into<String>) -> Self {
        Error::Usage(reason.into())
    }

    /// Code this error carries in the response envelope vocabulary.
    pub fn code(&self) -> i32 {
        match self {
            Error::RemoteExecution { code, .. } => *code,
            Error::Transport(_) => TRANSPORT_FAILURE,
            _ => LOCAL_FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
