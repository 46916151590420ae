use super::cell::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One parsed table row keyed by lower-cased column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: BTreeMap<String, CellValue>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cell; the column name is lower-cased
    pub fn insert(&mut self, column: &str, value: impl Into<CellValue>) {
        self.cells.insert(column.trim().to_lowercase(), value.into());
    }

    /// Look up a cell, returning `Missing` for absent columns
    pub fn get(&self, column: &str) -> &CellValue {
        static MISSING: CellValue = CellValue::Missing;
        self.cells.get(column).unwrap_or(&MISSING)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut CellValue> {
        self.cells.get_mut(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CellValue)> {
        self.cells.iter()
    }
}

impl<K: AsRef<str>, V: Into<CellValue>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k.as_ref(), v);
        }
        row
    }
}

/// A parsed table: detected column names plus rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Source name (file stem), used as actor or code label
    pub name: String,

    /// Lower-cased column names in source order
    pub columns: Vec<String>,

    pub rows: Vec<RawRow>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.trim().to_lowercase()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn push_row(&mut self, row: RawRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lowercases_columns() {
        let row: RawRow = [("Time", 1.0), (" X ", 2.0)].into_iter().collect();
        assert_eq!(row.get("time"), &CellValue::Number(1.0));
        assert_eq!(row.get("x"), &CellValue::Number(2.0));
        assert!(row.get("y").is_missing());
    }

    #[test]
    fn test_table_columns() {
        let table = Table::new("alice", &["Time", "X", "Y"]);
        assert!(table.has_column("time"));
        assert!(!table.has_column("Time"));
        assert!(table.is_empty());
    }
}
