pub mod auth;
pub mod cli;
pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod statement;
pub mod table;
pub mod value;

pub use client::{ClientConfig, Connection, RetryPolicy, TransactionState, with_connection};
pub use error::{Error, Result};
pub use protocol::{HttpTransport, LoopbackTransport, Transport};
pub use statement::{SqlStatement, StatementKind};
pub use table::{ResultTable, RowView};
pub use value::{SqlValue, TypedValue};
