//! Server-side request dispatch.
//!
//! [`Dispatcher`] turns one HTTP-shaped request into one binary response. It is stateless
//! apart from the [`Session`] the caller passes in: the connection-handling layer looks the
//! session up, locks it for the duration of the call and passes the request's source address.
//!
//! Every failure is converted into an [`ErrorEnvelope`] at the dispatch boundary; engine
//! faults keep their native code, everything else is reported as `-2`.
pub mod engine;
pub mod session;

use std::net::IpAddr;

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    auth,
    error::LOCAL_FAILURE,
    protocol::{CodecError, ErrorEnvelope, HttpRequest, Request, Response, decode_param},
    statement::StatementKind,
    table::ResultTable,
    value::{SqlValue, TypedValue, ValueError},
};

pub use engine::{Engine, EngineError, EngineRows};
pub use session::{Session, SessionId, SessionStore};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("authentication failed: {0}")]
    Authentication(&'static str),

    #[error("access denied")]
    Authorization,

    #[error("missing statement text")]
    MissingStatement,

    #[error("invalid parameter '{name}': {cause}")]
    Parameter { name: String, cause: CodecError },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("cannot serialize column '{column}': {cause}")]
    Column { column: String, cause: ValueError },

    #[error("engine returned a row of {actual} values for {expected} columns")]
    RowWidth { expected: usize, actual: usize },

    #[error("failed to encode response: {0}")]
    Codec(#[from] CodecError),
}

impl From<DispatchError> for ErrorEnvelope {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Engine(e) => ErrorEnvelope {
                code: e.code,
                message: e.message,
                trace: e.trace,
            },
            other => ErrorEnvelope {
                code: LOCAL_FAILURE,
                message: other.to_string(),
                trace: format!("{other:?}"),
            },
        }
    }
}

pub struct Dispatcher<E: Engine> {
    engine: E,
    secret: Vec<u8>,
}

impl<E: Engine> Dispatcher<E> {
    pub fn new(engine: E, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            engine,
            secret: secret.into(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Handles one request on behalf of `session` and returns the encoded response.
    ///
    /// Fails only when not even an error envelope can be encoded.
    pub fn dispatch(
        &self,
        session: &mut Session,
        peer: IpAddr,
        request: &HttpRequest,
    ) -> Result<Vec<u8>, CodecError> {
        let response = match self.route(session, peer, Request::from_http(request)) {
            Ok(response) => response,
            Err(e) => {
                warn!("request from {peer} failed: {e}");
                Response::Err(e.into())
            }
        };

        match response.encode() {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                warn!("failed to encode response for {peer}: {e}");
                Response::Err(DispatchError::Codec(e).into()).encode()
            }
        }
    }

    fn route(
        &self,
        session: &mut Session,
        peer: IpAddr,
        request: Request,
    ) -> Result<Response, DispatchError> {
        match request {
            Request::Challenge => {
                info!("received challenge request from {peer}");
                Ok(Response::Challenge(session.issue_challenge()))
            }
            Request::Login { code } => {
                info!("received login request from {peer}");
                self.login(session, peer, &code)
            }
            Request::Logout => {
                info!("received logout request from {peer}");
                session.invalidate();
                Ok(Response::Ack)
            }
            Request::Execute { text, params } => {
                info!("received execute request from {peer}");
                self.execute(session, peer, &text, &params)
            }
        }
    }

    fn login(
        &self,
        session: &mut Session,
        peer: IpAddr,
        code: &str,
    ) -> Result<Response, DispatchError> {
        let challenge = session
            .take_challenge()
            .ok_or(DispatchError::Authentication("challenge not initialized"))?;

        if !auth::verify(&self.secret, &challenge, code) {
            return Err(DispatchError::Authentication("invalid challenge response"));
        }

        session.bind(peer);
        debug!("session bound to {peer}");
        Ok(Response::Ack)
    }

    fn execute(
        &self,
        session: &Session,
        peer: IpAddr,
        text: &str,
        params: &[(String, String)],
    ) -> Result<Response, DispatchError> {
        if !session.is_authorized(peer) {
            return Err(DispatchError::Authorization);
        }
        if text.trim().is_empty() {
            return Err(DispatchError::MissingStatement);
        }

        let params = params
            .iter()
            .map(|(name, payload)| {
                let value = decode_param(payload).map_err(|cause| DispatchError::Parameter {
                    name: name.clone(),
                    cause,
                })?;
                Ok((name.clone(), SqlValue::from(value)))
            })
            .collect::<Result<Vec<_>, DispatchError>>()?;

        match StatementKind::classify(text) {
            StatementKind::Select => {
                let rows = self.engine.query(text, &params)?;
                debug!("query returned {} rows", rows.rows.len());
                Ok(Response::Table(into_table(rows)?))
            }
            StatementKind::Command => {
                let affected = self.engine.execute(text, &params)?;
                debug!("command affected {affected} rows");
                Ok(Response::RowsAffected(affected))
            }
        }
    }
}

/// Maps engine cells to wire values by runtime type.
///
/// Engine NULLs are written with the `Null` tag and no payload, whatever the column's declared
/// type. This deliberately departs from the `TinyInt` tag observed on the wire for NULL cells:
/// a `TinyInt` tag without its byte cannot be decoded by a fixed-width reader.
fn into_table(rows: EngineRows) -> Result<ResultTable, DispatchError> {
    let EngineRows { columns, rows } = rows;
    let mut table = ResultTable::new(columns.clone());

    for row in rows {
        let values = row
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                TypedValue::try_from(value).map_err(|cause| DispatchError::Column {
                    column: columns
                        .get(index)
                        .cloned()
                        .unwrap_or_else(|| format!("#{index}")),
                    cause,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        table
            .push(values)
            .map_err(|row| DispatchError::RowWidth {
                expected: columns.len(),
                actual: row.len(),
            })?;
    }

    Ok(table)
}
