//! Client side of the protocol.
//!
//! A [`Connection`] authenticates on open, then issues commands and queries over its
//! [`Transport`]. It tracks whether a transaction is open and refuses illegal sequences before
//! anything is sent. Each round trip runs inside the configured [`RetryPolicy`]; pre-flight
//! checks do not.
//!
//! A connection is a scoped resource. [`Connection::close`] (or dropping the connection) rolls
//! back an open transaction and logs out; failures during that teardown are logged, not raised,
//! on the drop path. [`with_connection`] wraps the whole lifecycle around a closure.
//!
//! # Example
//! ```no_run
//! use wiresql::{ClientConfig, HttpTransport, SqlStatement, with_connection};
//!
//! let transport = HttpTransport::new("http://localhost:8080/sql")?;
//! let config = ClientConfig::new("shared secret");
//!
//! let rows = with_connection(transport, config, |conn| {
//!     conn.command(SqlStatement::new("DELETE FROM t WHERE a = @a").bind("@a", 1)?)
//! })?;
//! println!("{rows} rows deleted");
//! # Ok::<(), wiresql::Error>(())
//! ```
//!
//! A connection mutates per-call state and is not meant to be shared between threads; use one
//! per logical connection, or guard it with a lock.
mod retry;
mod transaction;

use log::{debug, info, warn};

pub use retry::RetryPolicy;
pub use transaction::TransactionState;

use crate::{
    auth,
    error::{Error, Result},
    protocol::{CodecError, HttpRequest, Request, Response, ResponseKind, Transport},
    statement::{BEGIN_TRANSACTION, COMMIT, ROLLBACK, SqlStatement, StatementKind},
    table::ResultTable,
};

/// Client settings.
#[derive(Clone)]
pub struct ClientConfig {
    secret: Vec<u8>,
    retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("secret", &"<redacted>")
            .field("retry", &self.retry)
            .finish()
    }
}

/// An authenticated connection to a remote database.
pub struct Connection<T: Transport> {
    transport: T,
    retry: RetryPolicy,
    transaction: TransactionState,
    authenticated: bool,
}

impl<T: Transport> Connection<T> {
    /// Connects and runs the challenge/response login.
    pub fn open(transport: T, config: ClientConfig) -> Result<Self> {
        let mut conn = Self {
            transport,
            retry: config.retry,
            transaction: TransactionState::Idle,
            authenticated: false,
        };
        conn.login(&config.secret)?;
        Ok(conn)
    }

    fn login(&mut self, secret: &[u8]) -> Result<()> {
        let Response::Challenge(challenge) =
            self.exchange(&Request::Challenge.into(), ResponseKind::Challenge)?
        else {
            return Err(CodecError::Unexpected("challenge").into());
        };

        let code = auth::respond(secret, &challenge);
        self.exchange(&Request::Login { code }.into(), ResponseKind::Ack)?;

        self.authenticated = true;
        info!("connection authenticated");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn transaction(&self) -> TransactionState {
        self.transaction
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_active()
    }

    /// Runs a non-SELECT statement and returns the affected-row count.
    pub fn command(&mut self, statement: impl Into<SqlStatement>) -> Result<i32> {
        let statement = statement.into();
        if statement.kind() == StatementKind::Select {
            return Err(Error::usage(
                "SELECT statements must be run as a table query",
            ));
        }
        self.ensure_open()?;

        let request: HttpRequest = Request::execute(&statement)?.into();
        let retry = self.retry;
        retry.run(|| match self.exchange(&request, ResponseKind::RowsAffected)? {
            Response::RowsAffected(rows) => Ok(rows),
            _ => Err(CodecError::Unexpected("rows affected").into()),
        })
    }

    /// Runs a SELECT statement and returns its rows.
    pub fn table_query(&mut self, statement: impl Into<SqlStatement>) -> Result<ResultTable> {
        let statement = statement.into();
        if statement.kind() != StatementKind::Select {
            return Err(Error::usage("only SELECT statements can be run as a table query"));
        }
        self.transaction.ensure_query_allowed()?;
        self.ensure_open()?;

        let request: HttpRequest = Request::execute(&statement)?.into();
        let retry = self.retry;
        retry.run(|| match self.exchange(&request, ResponseKind::Table)? {
            Response::Table(table) => Ok(table),
            _ => Err(CodecError::Unexpected("table").into()),
        })
    }

    pub fn begin_transaction(&mut self) -> Result<()> {
        self.transaction.ensure_idle()?;
        self.command(BEGIN_TRANSACTION)?;
        self.transaction = TransactionState::Active;
        debug!("transaction started");
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.transaction.ensure_active()?;
        self.command(COMMIT)?;
        self.transaction = TransactionState::Idle;
        debug!("transaction committed");
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.transaction.ensure_active()?;
        self.command(ROLLBACK)?;
        self.transaction = TransactionState::Idle;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Rolls back an open transaction and logs out.
    ///
    /// Both steps are attempted; the first failure is returned.
    pub fn close(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if !self.authenticated {
            return Ok(());
        }

        let rollback = if self.in_transaction() {
            self.rollback()
        } else {
            Ok(())
        };
        // Nothing more is sent on this connection after logout, successful or not.
        self.authenticated = false;
        self.transaction = TransactionState::Idle;
        let logout = self
            .exchange(&Request::Logout.into(), ResponseKind::Ack)
            .map(|_| ());
        info!("connection closed");

        rollback.and(logout)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.authenticated {
            Ok(())
        } else {
            Err(Error::usage("connection is closed"))
        }
    }

    /// One exchange; a non-zero envelope becomes [`Error::RemoteExecution`].
    fn exchange(&mut self, request: &HttpRequest, kind: ResponseKind) -> Result<Response> {
        let bytes = self.transport.exchange(request)?;
        match Response::decode(&bytes, kind)? {
            Response::Err(envelope) => Err(envelope.into()),
            response => Ok(response),
        }
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("connection teardown failed: {e}");
        }
    }
}

/// Opens a connection, runs `f` with it and closes it on every exit path.
///
/// Teardown failures are logged; the closure's result is returned.
pub fn with_connection<T, R, E, F>(transport: T, config: ClientConfig, f: F) -> std::result::Result<R, E>
where
    T: Transport,
    E: From<Error>,
    F: FnOnce(&mut Connection<T>) -> std::result::Result<R, E>,
{
    let mut conn = Connection::open(transport, config)?;
    let result = f(&mut conn);
    if let Err(e) = conn.close() {
        warn!("connection teardown failed: {e}");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::{
        net::{IpAddr, Ipv4Addr},
        sync::Arc,
    };

    use crate::{
        protocol::{LoopbackTransport, TransportError},
        server::{Dispatcher, EngineError, EngineRows, SessionStore, engine::testing::MemoryEngine},
        value::{SqlValue, TypedValue},
    };

    use super::*;

    const SECRET: &[u8] = b"shared secret";

    struct Harness {
        engine: Arc<MemoryEngine>,
        sessions: Arc<SessionStore>,
        dispatcher: Arc<Dispatcher<Arc<MemoryEngine>>>,
    }

    impl Harness {
        fn new(engine: MemoryEngine) -> Self {
            let engine = Arc::new(engine);
            Self {
                dispatcher: Arc::new(Dispatcher::new(Arc::clone(&engine), SECRET)),
                sessions: Arc::new(SessionStore::default()),
                engine,
            }
        }

        fn transport(&self) -> LoopbackTransport<Arc<MemoryEngine>> {
            LoopbackTransport::new(
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.sessions),
                Ipv4Addr::LOCALHOST.into(),
            )
        }

        fn connect(&self) -> Connection<LoopbackTransport<Arc<MemoryEngine>>> {
            Connection::open(self.transport(), config()).unwrap()
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new(SECRET).with_retry(RetryPolicy::once())
    }

    /// Transport that fails a fixed number of times before delegating.
    struct Flaky<T> {
        inner: T,
        failures: u32,
    }

    impl<T: Transport> Transport for Flaky<T> {
        fn exchange(&mut self, request: &HttpRequest) -> std::result::Result<Vec<u8>, TransportError> {
            if self.failures > 0 && request.method == crate::protocol::Method::Post {
                self.failures -= 1;
                return Err(TransportError::Io(std::io::Error::other("connection reset")));
            }
            self.inner.exchange(request)
        }
    }

    #[test]
    fn open_authenticates() {
        let harness = Harness::new(MemoryEngine::default());
        let transport = harness.transport();
        let session = harness.sessions.get(transport.session()).unwrap();

        let conn = Connection::open(transport, config()).unwrap();
        assert!(conn.is_authenticated());
        assert_eq!(
            session.lock().unwrap().token(),
            Some(IpAddr::from(Ipv4Addr::LOCALHOST))
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let harness = Harness::new(MemoryEngine::default());
        let err = Connection::open(harness.transport(), ClientConfig::new("wrong"))
            .err()
            .unwrap();

        match err {
            Error::RemoteExecution { code, message, .. } => {
                assert_eq!(code, -2);
                assert!(message.contains("invalid challenge response"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn command_returns_rows_affected() {
        let harness = Harness::new(MemoryEngine::with_rows_affected(1));
        let mut conn = harness.connect();

        let rows = conn.command("INSERT INTO t(a) VALUES (1)").unwrap();
        assert_eq!(rows, 1);
        assert_eq!(
            harness.engine.statements(),
            vec!["INSERT INTO t(a) VALUES (1);"]
        );
    }

    #[test]
    fn command_sends_parameters() {
        let harness = Harness::new(MemoryEngine::with_rows_affected(1));
        let mut conn = harness.connect();

        let statement = SqlStatement::new("UPDATE t SET a = @a, b = @b")
            .bind("@a", "text")
            .unwrap()
            .bind("@b", None::<i64>)
            .unwrap();
        conn.command(statement).unwrap();
        conn.command("DELETE FROM t").unwrap();

        let calls = harness.engine.calls.lock().unwrap();
        assert_eq!(
            calls[0].params,
            vec![
                ("@a".to_string(), SqlValue::Text("text".into())),
                ("@b".to_string(), SqlValue::Null),
            ]
        );
        assert!(calls[1].params.is_empty());
    }

    #[test]
    fn table_query_returns_rows() {
        let harness = Harness::new(MemoryEngine::with_table(EngineRows {
            columns: vec!["a".into(), "b".into()],
            rows: vec![
                vec![SqlValue::Int32(10), SqlValue::Text("x".into())],
                vec![SqlValue::Int32(20), SqlValue::Null],
            ],
        }));
        let mut conn = harness.connect();

        let table = conn.table_query("SELECT a, b FROM t").unwrap();
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.row(0).unwrap().get("a"), Some(&TypedValue::Int(10)));
        assert_eq!(table.row(1).unwrap().get("b"), Some(&TypedValue::Null));
    }

    #[test]
    fn select_rejected_by_command() {
        let harness = Harness::new(MemoryEngine::default());
        let mut conn = harness.connect();

        assert!(matches!(conn.command("SELECT 1"), Err(Error::Usage(_))));
        assert!(harness.engine.statements().is_empty());
    }

    #[test]
    fn non_select_rejected_by_query() {
        let harness = Harness::new(MemoryEngine::default());
        let mut conn = harness.connect();

        assert!(matches!(
            conn.table_query("UPDATE t SET x=1"),
            Err(Error::Usage(_))
        ));
        assert!(harness.engine.statements().is_empty());
    }

    #[test]
    fn query_rejected_inside_transaction() {
        let harness = Harness::new(MemoryEngine::default());
        let mut conn = harness.connect();

        conn.begin_transaction().unwrap();
        assert!(matches!(conn.table_query("SELECT 1"), Err(Error::Usage(_))));
        assert_eq!(harness.engine.statements(), vec![BEGIN_TRANSACTION]);
    }

    #[test]
    fn transaction_legality() {
        let harness = Harness::new(MemoryEngine::default());
        let mut conn = harness.connect();

        assert!(matches!(conn.commit(), Err(Error::Usage(_))));
        assert!(matches!(conn.rollback(), Err(Error::Usage(_))));

        conn.begin_transaction().unwrap();
        assert!(matches!(conn.begin_transaction(), Err(Error::Usage(_))));

        conn.commit().unwrap();
        assert!(matches!(conn.commit(), Err(Error::Usage(_))));

        conn.begin_transaction().unwrap();
        conn.rollback().unwrap();
        assert!(!conn.in_transaction());

        assert_eq!(
            harness.engine.statements(),
            vec![BEGIN_TRANSACTION, COMMIT, BEGIN_TRANSACTION, ROLLBACK]
        );
    }

    #[test]
    fn failed_begin_stays_idle() {
        let harness = Harness::new(MemoryEngine::default());
        let mut conn = harness.connect();
        harness.engine.fail_next(EngineError::new(3902, "no"));

        assert!(conn.begin_transaction().is_err());
        assert!(!conn.in_transaction());
    }

    #[test]
    fn remote_error_carries_envelope() {
        let harness = Harness::new(MemoryEngine::default());
        let mut conn = harness.connect();
        harness
            .engine
            .fail_next(EngineError::new(547, "constraint").with_trace("stack"));

        match conn.command("DELETE FROM parent").unwrap_err() {
            Error::RemoteExecution {
                code,
                message,
                trace,
            } => {
                assert_eq!(code, 547);
                assert_eq!(message, "constraint");
                assert_eq!(trace, "stack");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn execute_from_new_address_is_denied() {
        let harness = Harness::new(MemoryEngine::default());
        let mut transport = harness.transport();
        let conn = Connection::open(&mut transport, config()).unwrap();
        drop(conn);

        // Dropping logged the session out; log in again, then move.
        let mut conn = Connection::open(&mut transport, config()).unwrap();
        conn.transport.set_peer(Ipv4Addr::new(10, 1, 1, 1).into());
        match conn.command("DELETE FROM t").unwrap_err() {
            Error::RemoteExecution { message, .. } => assert_eq!(message, "access denied"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn drop_rolls_back_and_logs_out() {
        let harness = Harness::new(MemoryEngine::default());
        let transport = harness.transport();
        let session = harness.sessions.get(transport.session()).unwrap();

        {
            let mut conn = Connection::open(transport, config()).unwrap();
            conn.begin_transaction().unwrap();
        }

        assert_eq!(
            harness.engine.statements(),
            vec![BEGIN_TRANSACTION, ROLLBACK]
        );
        assert_eq!(session.lock().unwrap().token(), None);
    }

    #[test]
    fn close_reports_teardown_failure() {
        let harness = Harness::new(MemoryEngine::default());
        let mut conn = harness.connect();
        conn.begin_transaction().unwrap();
        harness.engine.fail_next(EngineError::new(1, "rollback failed"));

        assert!(conn.close().is_err());
        assert_eq!(harness.sessions.len(), 0);
    }

    #[test]
    fn with_connection_closes_on_error() {
        let harness = Harness::new(MemoryEngine::default());
        let transport = harness.transport();
        let session = harness.sessions.get(transport.session()).unwrap();

        let result: Result<()> = with_connection(transport, config(), |conn| {
            conn.begin_transaction()?;
            Err(Error::usage("caller bailed out"))
        });

        assert!(matches!(result, Err(Error::Usage(_))));
        assert_eq!(
            harness.engine.statements(),
            vec![BEGIN_TRANSACTION, ROLLBACK]
        );
        assert_eq!(session.lock().unwrap().token(), None);
    }

    #[test]
    fn retry_recovers_from_transport_failures() {
        let harness = Harness::new(MemoryEngine::with_rows_affected(2));
        let transport = Flaky {
            inner: harness.transport(),
            failures: 2,
        };
        let retry = RetryPolicy::new(3, std::time::Duration::ZERO).unwrap();
        let mut conn = Connection::open(transport, ClientConfig::new(SECRET).with_retry(retry)).unwrap();

        assert_eq!(conn.command("DELETE FROM t").unwrap(), 2);
    }

    #[test]
    fn retry_exhaustion_surfaces_transport_error() {
        let harness = Harness::new(MemoryEngine::default());
        let transport = Flaky {
            inner: harness.transport(),
            failures: 5,
        };
        let retry = RetryPolicy::new(2, std::time::Duration::ZERO).unwrap();
        let mut conn = Connection::open(transport, ClientConfig::new(SECRET).with_retry(retry)).unwrap();

        let err = conn.command("DELETE FROM t").unwrap_err();
        assert_eq!(err.code(), crate::error::TRANSPORT_FAILURE);
        assert_eq!(conn.transport.failures, 3);
    }

    #[test]
    fn closed_connection_refuses_work() {
        let harness = Harness::new(MemoryEngine::default());
        let mut conn = harness.connect();
        conn.teardown().unwrap();

        assert!(matches!(conn.command("DELETE FROM t"), Err(Error::Usage(_))));
    }
}
