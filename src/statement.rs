//! SQL statements and their bound parameters.
//!
//! Statement text is opaque: it is trimmed and terminated with a single `;`, nothing more.
//! Routing between the command and query paths uses [`StatementKind::classify`], a plain
//! case-insensitive `SELECT` prefix test. A leading comment or a `WITH` clause is therefore
//! classified as a command; callers relying on other shapes need a compatibility decision
//! before this test changes, since the server gates on the same function.
use crate::{
    error::{Error, Result},
    value::{SqlValue, TypedValue},
};

pub const BEGIN_TRANSACTION: &str = "BEGIN TRANSACTION;";
pub const COMMIT: &str = "COMMIT;";
pub const ROLLBACK: &str = "ROLLBACK;";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Returns rows; travels through the query path.
    Select,
    /// Anything else; travels through the command path.
    Command,
}

impl StatementKind {
    pub fn classify(text: &str) -> Self {
        let head = text.as_bytes().get(..6);
        match head {
            Some(head) if head.eq_ignore_ascii_case(b"select") => StatementKind::Select,
            _ => StatementKind::Command,
        }
    }
}

/// Trims `text` and terminates it with exactly one `;`.
pub fn normalize(text: &str) -> String {
    let trimmed = text.trim().trim_end_matches(';').trim_end();
    format!("{trimmed};")
}

/// Statement text plus named parameters in binding order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    text: String,
    params: Vec<(String, TypedValue)>,
}

impl SqlStatement {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self {
            text: normalize(text.as_ref()),
            params: Vec::new(),
        }
    }

    /// Binds `value` under `name`.
    ///
    /// Fails with a usage error if the name is already bound or the value's runtime type has
    /// no wire tag.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name == "q" {
            return Err(Error::usage(format!("invalid parameter name '{name}'")));
        }
        if self.params.iter().any(|(bound, _)| *bound == name) {
            return Err(Error::usage(format!("parameter '{name}' is already bound")));
        }

        let value: SqlValue = value.into();
        let value = TypedValue::try_from(value).map_err(|e| Error::usage(e.to_string()))?;
        self.params.push((name, value));
        Ok(self)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[(String, TypedValue)] {
        &self.params
    }

    pub fn kind(&self) -> StatementKind {
        StatementKind::classify(&self.text)
    }
}

impl From<&str> for SqlStatement {
    fn from(value: &str) -> Self {
        SqlStatement::new(value)
    }
}

impl From<String> for SqlStatement {
    fn from(value: String) -> Self {
        SqlStatement::new(value)
    }
}

macro_rules! sql_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for SqlValue {
                fn from(value: $source) -> Self {
                    SqlValue::$variant(value.into())
                }
            }
        )*
    };
}

sql_from! {
    u8 => Byte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Single,
    f64 => Double,
    bool => Bool,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    chrono::NaiveDateTime => DateTime,
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("SELECT 1");
        assert_eq!(once, "SELECT 1;");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_collapses_terminators() {
        assert_eq!(normalize("  DELETE FROM t ;; \n"), "DELETE FROM t;");
    }

    #[test]
    fn classify_case_insensitive() {
        assert_eq!(StatementKind::classify("select 1;"), StatementKind::Select);
        assert_eq!(StatementKind::classify("SeLeCt * FROM t"), StatementKind::Select);
        assert_eq!(
            StatementKind::classify("UPDATE t SET x=1"),
            StatementKind::Command
        );
        assert_eq!(StatementKind::classify("sel"), StatementKind::Command);
    }

    #[test]
    fn classify_inherits_prefix_heuristic() {
        assert_eq!(
            StatementKind::classify("/* report */ SELECT 1"),
            StatementKind::Command
        );
        assert_eq!(StatementKind::classify("   SELECT 1"), StatementKind::Command);
        assert_eq!(SqlStatement::new("   SELECT 1").kind(), StatementKind::Select);
    }

    #[test]
    fn bind_preserves_order() {
        let statement = SqlStatement::new("INSERT INTO t(a, b) VALUES (@b, @a)")
            .bind("@b", 2)
            .unwrap()
            .bind("@a", "one")
            .unwrap();

        let names = statement
            .params()
            .iter()
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["@b", "@a"]);
        assert_eq!(statement.params()[0].1, TypedValue::Int(2));
        assert_eq!(statement.params()[1].1, TypedValue::NVarChar("one".into()));
    }

    #[test]
    fn bind_null_option() {
        let statement = SqlStatement::new("UPDATE t SET a = @a")
            .bind("@a", None::<i32>)
            .unwrap();
        assert_eq!(statement.params()[0].1, TypedValue::Null);
    }

    #[test]
    #[should_panic(expected = "already bound")]
    fn bind_duplicate_name() {
        SqlStatement::new("SELECT @a")
            .bind("@a", 1)
            .unwrap()
            .bind("@a", 2)
            .unwrap();
    }

    #[test]
    fn bind_datetime_past_tick_range() {
        let far = chrono::NaiveDate::from_ymd_opt(100_000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let err = SqlStatement::new("SELECT @d").bind("@d", far).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(err.to_string().contains("tick range"), "{err}");
    }

    #[test]
    #[should_panic(expected = "unsupported value type 'bool'")]
    fn bind_unsupported_type() {
        SqlStatement::new("SELECT @a").bind("@a", true).unwrap();
    }
}
