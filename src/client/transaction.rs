use crate::error::{Error, Result};

/// Client-side view of the connection's transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionState {
    #[default]
    Idle,
    Active,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        *self == TransactionState::Active
    }

    pub fn ensure_idle(&self) -> Result<()> {
        match self {
            TransactionState::Idle => Ok(()),
            TransactionState::Active => Err(Error::usage("already in a transaction")),
        }
    }

    pub fn ensure_active(&self) -> Result<()> {
        match self {
            TransactionState::Active => Ok(()),
            TransactionState::Idle => Err(Error::usage("not in a transaction")),
        }
    }

    /// Queries are not allowed while a transaction is open.
    pub fn ensure_query_allowed(&self) -> Result<()> {
        match self {
            TransactionState::Idle => Ok(()),
            TransactionState::Active => Err(Error::usage(
                "SELECT queries are not allowed inside a transaction",
            )),
        }
    }
}
