//! In-memory query results.
use std::fmt;

use crate::value::TypedValue;

/// Column schema plus the rows of a query, each row aligned with the columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<TypedValue>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row. Returns the row back if its width does not match the schema.
    pub fn push(&mut self, row: Vec<TypedValue>) -> Result<(), Vec<TypedValue>> {
        if row.len() != self.columns.len() {
            return Err(row);
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<TypedValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        self.rows.get(index).map(|values| RowView {
            table: self,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(|values| RowView {
            table: self,
            values,
        })
    }
}

/// A single row that can be indexed by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a ResultTable,
    values: &'a [TypedValue],
}

impl<'a> RowView<'a> {
    pub fn get(&self, column: &str) -> Option<&'a TypedValue> {
        self.table
            .column_index(column)
            .and_then(|index| self.values.get(index))
    }

    pub fn values(&self) -> &'a [TypedValue] {
        self.values
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        let mut widths = self.columns.iter().map(|c| c.len()).collect::<Vec<_>>();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let line = |f: &mut fmt::Formatter<'_>, values: &[String]| -> fmt::Result {
            let parts = values
                .iter()
                .zip(&widths)
                .map(|(v, &w)| format!("{v:<w$}"))
                .collect::<Vec<_>>();
            writeln!(f, "| {} |", parts.join(" | "))
        };

        line(f, &self.columns)?;
        let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        writeln!(f, "|-{}-|", rule.join("-|-"))?;
        for row in &cells {
            line(f, row)?;
        }
        write!(f, "({} rows)", self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ResultTable {
        let mut table = ResultTable::new(vec!["a".into(), "b".into()]);
        table
            .push(vec![TypedValue::Int(1), TypedValue::NVarChar("x".into())])
            .unwrap();
        table
            .push(vec![TypedValue::Int(2), TypedValue::Null])
            .unwrap();
        table
    }

    #[test]
    fn row_lookup_by_column_name() {
        let table = table();
        let row = table.row(1).unwrap();

        assert_eq!(row.get("a"), Some(&TypedValue::Int(2)));
        assert_eq!(row.get("b"), Some(&TypedValue::Null));
        assert_eq!(row.get("missing"), None);
        assert!(table.row(2).is_none());
    }

    #[test]
    fn push_rejects_misaligned_row() {
        let mut table = table();
        assert!(table.push(vec![TypedValue::Int(3)]).is_err());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn display_grid() {
        let out = table().to_string();
        let expected = "| a | b    |\n|---|------|\n| 1 | x    |\n| 2 | NULL |\n(2 rows)";
        assert_eq!(out, expected);
    }
}
