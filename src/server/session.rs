//! Per-connection server state.
//!
//! A [`Session`] holds the pending login challenge and, once authenticated, the address the
//! login came from. The connection-handling layer owns sessions through a [`SessionStore`]:
//! it creates one per connection, hands it to the dispatcher for each request, and invalidates
//! it when the connection goes away.
//!
//! Requests on the same session are serialised by the per-session mutex; the login handshake
//! is a read-modify sequence (issue a challenge, later consume it) and relies on that.
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use log::debug;

use crate::auth::{Challenge, generate_challenge};

#[derive(Debug, Default)]
pub struct Session {
    challenge: Option<Challenge>,
    token: Option<IpAddr>,
}

impl Session {
    /// Generates and stores a new pending challenge, replacing any earlier one.
    pub fn issue_challenge(&mut self) -> Challenge {
        let challenge = generate_challenge();
        self.challenge = Some(challenge);
        challenge
    }

    /// Removes and returns the pending challenge.
    pub fn take_challenge(&mut self) -> Option<Challenge> {
        self.challenge.take()
    }

    /// Records `addr` as the authenticated source address.
    pub fn bind(&mut self, addr: IpAddr) {
        self.token = Some(addr);
    }

    pub fn token(&self) -> Option<IpAddr> {
        self.token
    }

    pub fn is_authorized(&self, addr: IpAddr) -> bool {
        self.token == Some(addr)
    }

    /// Drops the session token and any pending challenge.
    pub fn invalidate(&mut self) {
        self.token = None;
        self.challenge = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

/// Sessions keyed by connection.
#[derive(Debug, Default)]
pub struct SessionStore {
    next: AtomicU64,
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn create(&self) -> SessionId {
        let id = SessionId(self.next.fetch_add(1, Ordering::Relaxed));
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(Session::default())));
        debug!("created session {id:?}");
        id
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Mutex<Session>>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Disposes of a session; later lookups of `id` fail.
    pub fn invalidate(&self, id: SessionId) {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        if let Some(session) = removed {
            session
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .invalidate();
            debug!("invalidated session {id:?}");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
