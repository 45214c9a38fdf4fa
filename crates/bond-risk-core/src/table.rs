//! Row-oriented table of named cells.
//!
//! This is the shape spreadsheet exports arrive in and the shape the
//! analysis results leave in: an ordered list of column names and a list of
//! rows keyed by those names.

use rust_decimal::Decimal;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::BondRiskError;
use crate::BondRiskResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single table value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(Decimal),
    Text(String),
    #[default]
    Empty,
}

/// One row, keyed by column name. Absent keys read as [`Cell::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: BTreeMap<String, Cell>,
}

/// Ordered columns plus rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

static EMPTY: Cell = Cell::Empty;

impl Cell {
    /// Parse a raw spreadsheet value: blank → `Empty`, numeric → `Number`,
    /// anything else → `Text`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Cell::Number)
            .unwrap_or_else(|_| Cell::Text(trimmed.to_string()))
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Normalised join key; empty cells never match anything.
    fn join_key(&self) -> Option<String> {
        match self {
            Cell::Number(n) => Some(n.normalize().to_string()),
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::Empty => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Empty => Ok(()),
        }
    }
}

impl From<Decimal> for Cell {
    fn from(value: Decimal) -> Self {
        Cell::Number(value)
    }
}

impl From<Option<Decimal>> for Cell {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(Cell::Empty, Cell::Number)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> &Cell {
        self.cells.get(field).unwrap_or(&EMPTY)
    }

    pub fn number(&self, field: &str) -> Option<Decimal> {
        self.get(field).as_number()
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).as_text()
    }

    pub fn set(&mut self, field: impl Into<String>, cell: impl Into<Cell>) {
        self.cells.insert(field.into(), cell.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Cell> {
        self.cells.remove(field)
    }

    /// Numeric value that may be blank. Text that does not parse as a number
    /// is an error rather than a silent blank.
    pub fn optional_number(
        &self,
        field: &str,
        row_index: usize,
    ) -> BondRiskResult<Option<Decimal>> {
        match self.get(field) {
            Cell::Number(n) => Ok(Some(*n)),
            Cell::Empty => Ok(None),
            Cell::Text(raw) => Err(BondRiskError::InvalidInput {
                field: field.to_string(),
                reason: format!("Row {row_index}: expected a number or blank, found '{raw}'"),
            }),
        }
    }

    /// Numeric value that must be present, with the row index in the error.
    pub fn require_number(&self, field: &str, row_index: usize) -> BondRiskResult<Decimal> {
        self.number(field)
            .ok_or_else(|| BondRiskError::InvalidInput {
                field: field.to_string(),
                reason: format!(
                    "Row {row_index}: expected a number, found '{}'",
                    self.get(field)
                ),
            })
    }
}

impl<K: Into<String>, V: Into<Cell>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let mut table = Table::default();
        for c in columns {
            table.ensure_column(c);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Add a column at the end if it is not already present.
    pub fn ensure_column(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.has_column(&name) {
            self.columns.push(name);
        }
    }

    /// Append a row; any fields it carries that the table lacks become new columns.
    pub fn push_row(&mut self, row: Row) {
        for key in row.cells.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Append a row given positionally in column order.
    pub fn push_values(&mut self, values: Vec<Cell>) -> BondRiskResult<()> {
        if values.len() != self.columns.len() {
            return Err(BondRiskError::LengthMismatch {
                context: format!("row {} values", self.rows.len()),
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        let row = self.columns.iter().cloned().zip(values).collect();
        self.rows.push(row);
        Ok(())
    }

    /// Names from `required` that are not columns of this table.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Fail with every missing column named.
    pub fn require_columns(&self, required: &[&str]) -> BondRiskResult<()> {
        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BondRiskError::MissingFields(missing))
        }
    }

    /// Cells of one row in column order.
    pub fn row_values(&self, index: usize) -> Option<Vec<&Cell>> {
        let row = self.rows.get(index)?;
        Some(self.columns.iter().map(|c| row.get(c)).collect())
    }

    pub fn drop_columns(&mut self, names: &[&str]) {
        self.columns.retain(|c| !names.contains(&c.as_str()));
        for row in &mut self.rows {
            for name in names {
                row.remove(name);
            }
        }
    }

    /// Rename one column in place. Returns false when `from` is absent or
    /// `to` already exists.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if !self.has_column(from) || self.has_column(to) {
            return false;
        }
        for c in &mut self.columns {
            if c == from {
                *c = to.to_string();
            }
        }
        for row in &mut self.rows {
            if let Some(cell) = row.remove(from) {
                row.set(to, cell);
            }
        }
        true
    }

    /// Rename every column to `<name><suffix>`.
    pub fn with_suffix(self, suffix: &str) -> Table {
        let rename = |c: &str| format!("{c}{suffix}");
        Table {
            columns: self.columns.iter().map(|c| rename(c.as_str())).collect(),
            rows: self
                .rows
                .into_iter()
                .map(|row| {
                    row.cells
                        .into_iter()
                        .map(|(k, v)| (rename(k.as_str()), v))
                        .collect()
                })
                .collect(),
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Row) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Inner join on `left_key == right_key`.
    ///
    /// Output rows follow left order, then right order within a key. Columns
    /// present on both sides (other than a shared key) are suffixed `_x` and `_y`.
    pub fn inner_join(&self, right: &Table, left_key: &str, right_key: &str) -> Table {
        let shared_key = left_key == right_key;
        let collides = |c: &String| {
            !(shared_key && c == left_key) && self.has_column(c) && right.has_column(c)
        };

        let left_name = |c: &String| {
            if collides(c) {
                format!("{c}_x")
            } else {
                c.clone()
            }
        };
        let right_name = |c: &String| {
            if collides(c) {
                format!("{c}_y")
            } else {
                c.clone()
            }
        };

        let mut columns: Vec<String> = self.columns.iter().map(|c| left_name(c)).collect();
        for c in &right.columns {
            if shared_key && c == right_key {
                continue;
            }
            columns.push(right_name(c));
        }

        let mut rows = Vec::new();
        for l in &self.rows {
            let Some(key) = l.get(left_key).join_key() else {
                continue;
            };
            for r in right
                .rows
                .iter()
                .filter(|r| r.get(right_key).join_key().as_deref() == Some(key.as_str()))
            {
                let mut merged = Row::new();
                for c in &self.columns {
                    merged.set(left_name(c), l.get(c).clone());
                }
                for c in &right.columns {
                    if shared_key && c == right_key {
                        continue;
                    }
                    merged.set(right_name(c), r.get(c).clone());
                }
                rows.push(merged);
            }
        }

        Table { columns, rows }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (k, v) in &self.cells {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Serialises as an array of objects with keys in column order.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Ordered<'a>(&'a [String], &'a Row);

        impl Serialize for Ordered<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for c in self.0 {
                    map.serialize_entry(c, self.1.get(c))?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&Ordered(&self.columns, row))?;
        }
        seq.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
