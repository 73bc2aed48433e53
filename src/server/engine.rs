//! The relational engine the dispatcher executes against.
use thiserror::Error;

use crate::value::SqlValue;

/// A fault reported by the engine, with its native error code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub code: i32,
    pub message: String,
    pub trace: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            trace: String::new(),
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = trace.into();
        self
    }
}

/// Column schema plus rows as the engine produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// Execute and query primitives of an already connected engine.
///
/// Transaction control arrives as ordinary statements (`BEGIN TRANSACTION;`, `COMMIT;`,
/// `ROLLBACK;`) through [`Engine::execute`].
pub trait Engine: Send + Sync {
    /// Runs a statement that returns no rows, yielding the affected-row count.
    fn execute(&self, text: &str, params: &[(String, SqlValue)]) -> Result<i32, EngineError>;

    fn query(&self, text: &str, params: &[(String, SqlValue)]) -> Result<EngineRows, EngineError>;
}

impl<E: Engine + ?Sized> Engine for std::sync::Arc<E> {
    fn execute(&self, text: &str, params: &[(String, SqlValue)]) -> Result<i32, EngineError> {
        (**self).execute(text, params)
    }

    fn query(&self, text: &str, params: &[(String, SqlValue)]) -> Result<EngineRows, EngineError> {
        (**self).query(text, params)
    }
}
