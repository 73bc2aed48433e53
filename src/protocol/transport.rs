use std::{
    io,
    net::IpAddr,
    sync::{Arc, PoisonError},
};

use log::{debug, trace};
use reqwest::{Url, blocking::Client};
use thiserror::Error;

use crate::server::{Dispatcher, Engine, SessionId, SessionStore};

use super::request::{HttpRequest, Method};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    Endpoint { endpoint: String, reason: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server failed to produce a response: {0}")]
    Server(String),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

/// One request/response exchange with the server.
///
/// Implementations keep whatever binds consecutive exchanges to one server-side session
/// (a cookie, a session id). Each call carries its own complete query string and form.
pub trait Transport {
    fn exchange(&mut self, request: &HttpRequest) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, request: &HttpRequest) -> Result<Vec<u8>, TransportError> {
        (**self).exchange(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, request: &HttpRequest) -> Result<Vec<u8>, TransportError> {
        (**self).exchange(request)
    }
}

/// Blocking HTTP transport; the server session rides on a cookie.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let mut url = Url::parse(endpoint).map_err(|e| TransportError::Endpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        url.set_query(None);

        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            endpoint: url,
        })
    }
}

impl Transport for HttpTransport {
    fn exchange(&mut self, request: &HttpRequest) -> Result<Vec<u8>, TransportError> {
        let builder = match request.method {
            Method::Get => self
                .client
                .get(self.endpoint.clone())
                .query(&request.query),
            Method::Post => self
                .client
                .post(self.endpoint.clone())
                .form(&request.form),
        };

        let response = builder.send()?.error_for_status()?;
        let body = response.bytes()?;
        trace!("received {} bytes from {}", body.len(), self.endpoint);
        Ok(body.to_vec())
    }
}

/// In-process transport that hands requests straight to a [`Dispatcher`].
///
/// Owns one session in the store for its lifetime; dropping the transport disposes of the
/// session, as closing the underlying connection would.
pub struct LoopbackTransport<E: Engine> {
    dispatcher: Arc<Dispatcher<E>>,
    sessions: Arc<SessionStore>,
    session: SessionId,
    peer: IpAddr,
}

impl<E: Engine> LoopbackTransport<E> {
    pub fn new(dispatcher: Arc<Dispatcher<E>>, sessions: Arc<SessionStore>, peer: IpAddr) -> Self {
        let session = sessions.create();
        Self {
            dispatcher,
            sessions,
            session,
            peer,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Changes the source address of subsequent requests.
    pub fn set_peer(&mut self, peer: IpAddr) {
        self.peer = peer;
    }
}

impl<E: Engine> Transport for LoopbackTransport<E> {
    fn exchange(&mut self, request: &HttpRequest) -> Result<Vec<u8>, TransportError> {
        let session = self.sessions.get(self.session).ok_or_else(|| {
            TransportError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "session was disposed",
            ))
        })?;
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);

        self.dispatcher
            .dispatch(&mut session, self.peer, request)
            .map_err(|e| TransportError::Server(e.to_string()))
    }
}

impl<E: Engine> Drop for LoopbackTransport<E> {
    fn drop(&mut self) {
        debug!("disposing loopback session {:?}", self.session);
        self.sessions.invalidate(self.session);
    }
}
