use crate::columns;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

static NULL_CELL: CellValue = CellValue::Null;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("row not found: {0}")]
    RowNotFound(RowId),
}

/// Stable row identity. Survives filtering and is never reused within a table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Default for CellValue {
    fn default() -> Self {
        Self::Null
    }
}

impl CellValue {
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Null => Cow::Borrowed(""),
            CellValue::Bool(flag) => Cow::Borrowed(if *flag { "true" } else { "false" }),
            CellValue::Number(n) => Cow::Owned(format_number(*n)),
            CellValue::Text(text) => Cow::Borrowed(text.as_str()),
        }
    }

    pub fn as_number(&self) -> f64 {
        coerce_number(self)
    }

    pub fn as_bool(&self) -> bool {
        match self {
            CellValue::Bool(flag) => *flag,
            CellValue::Number(n) => *n != 0.0,
            CellValue::Text(text) => matches!(
                text.trim().to_lowercase().as_str(),
                "true" | "yes" | "1"
            ),
            CellValue::Null => false,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// Decimal parse; anything that does not yield a finite number is zero.
pub fn coerce_number(value: &CellValue) -> f64 {
    let parsed = match value {
        CellValue::Number(n) => *n,
        CellValue::Text(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        CellValue::Null | CellValue::Bool(_) => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    #[serde(default)]
    cells: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    /// Tolerant text read; missing cells read as "".
    pub fn text(&self, column: &str) -> String {
        self.get(column)
            .map(|value| value.as_text().into_owned())
            .unwrap_or_default()
    }

    /// Tolerant numeric read; missing or unparseable cells read as 0.
    pub fn number(&self, column: &str) -> f64 {
        self.get(column).map(coerce_number).unwrap_or(0.0)
    }

    pub fn flag(&self, column: &str) -> bool {
        self.get(column).map(CellValue::as_bool).unwrap_or(false)
    }
}

/// One uploaded batch: ordered columns over rows with stable ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTable {
    columns: Vec<String>,
    rows: Vec<Row>,
    #[serde(default)]
    next_row_id: u64,
}

impl RecordTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for column in columns {
            table.ensure_column(&column.into());
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn row_ids(&self) -> Vec<RowId> {
        self.rows.iter().map(|row| row.id).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row. Cells for unknown columns extend the schema.
    pub fn push_row<I, K, V>(&mut self, cells: I) -> RowId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CellValue>,
    {
        let id = RowId(self.next_row_id);
        self.next_row_id += 1;

        let mut row = Row {
            id,
            cells: BTreeMap::new(),
        };
        for (column, value) in cells {
            let column = column.into();
            self.ensure_column(&column);
            row.cells.insert(column, value.into());
        }
        self.rows.push(row);
        id
    }

    /// Strict column read; cells missing from a row come back as null.
    pub fn column(&self, name: &str) -> Result<Vec<&CellValue>, TableError> {
        if !self.has_column(name) {
            return Err(TableError::ColumnNotFound(name.to_string()));
        }
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(name).unwrap_or(&NULL_CELL))
            .collect())
    }

    pub fn text(&self, id: RowId, column: &str) -> String {
        self.row(id).map(|row| row.text(column)).unwrap_or_default()
    }

    pub fn number(&self, id: RowId, column: &str) -> f64 {
        self.row(id).map(|row| row.number(column)).unwrap_or(0.0)
    }

    pub fn filter<F>(&self, predicate: F) -> RecordTable
    where
        F: Fn(&Row) -> bool,
    {
        RecordTable {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(*row))
                .cloned()
                .collect(),
            next_row_id: self.next_row_id,
        }
    }

    /// The only in-place mutation. Writing to a new column adds it to the schema.
    pub fn set_cell(
        &mut self,
        id: RowId,
        column: &str,
        value: impl Into<CellValue>,
    ) -> Result<(), TableError> {
        let idx = self
            .rows
            .iter()
            .position(|row| row.id == id)
            .ok_or(TableError::RowNotFound(id))?;
        self.ensure_column(column);
        self.rows[idx].cells.insert(column.to_string(), value.into());
        Ok(())
    }

    /// Writes the same value into every row, one `set_cell` at a time.
    pub fn fill_column(
        &mut self,
        column: &str,
        value: impl Into<CellValue>,
    ) -> Result<(), TableError> {
        let value = value.into();
        self.ensure_column(column);
        for id in self.row_ids() {
            self.set_cell(id, column, value.clone())?;
        }
        Ok(())
    }

    pub fn find_row_by_fido(&self, fido_id: &str) -> Option<RowId> {
        let needle = fido_id.trim();
        self.rows
            .iter()
            .find(|row| row.text(columns::FIDO_ID).trim() == needle)
            .map(|row| row.id)
    }

    fn ensure_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordTable {
        let mut table = RecordTable::new(["fido_id", "brand", "gmv"]);
        table.push_row([("fido_id", "F-1"), ("brand", "Acme"), ("gmv", "12.5")]);
        table.push_row([("fido_id", "F-2"), ("brand", "Globex"), ("gmv", "n/a")]);
        table.push_row([("fido_id", "F-3"), ("brand", "Initech")]);
        table
    }

    #[test]
    fn coercion_never_fails() {
        assert_eq!(coerce_number(&CellValue::from("12.5")), 12.5);
        assert_eq!(coerce_number(&CellValue::from(" 7 ")), 7.0);
        assert_eq!(coerce_number(&CellValue::from("n/a")), 0.0);
        assert_eq!(coerce_number(&CellValue::from("NaN")), 0.0);
        assert_eq!(coerce_number(&CellValue::from("inf")), 0.0);
        assert_eq!(coerce_number(&CellValue::Null), 0.0);
        assert_eq!(coerce_number(&CellValue::Number(-3.25)), -3.25);
    }

    #[test]
    fn tolerant_reads_default_and_strict_column_fails() {
        let table = sample();
        let ids = table.row_ids();
        assert_eq!(table.number(ids[1], "gmv"), 0.0);
        assert_eq!(table.number(ids[2], "gmv"), 0.0);
        assert_eq!(table.text(ids[0], "missing"), "");
        assert_eq!(table.text(RowId(99), "brand"), "");

        assert_eq!(
            table.column("missing"),
            Err(TableError::ColumnNotFound("missing".to_string()))
        );
        let gmv = table.column("gmv").expect("gmv column");
        assert_eq!(gmv.len(), 3);
        assert_eq!(gmv[2], &CellValue::Null);
    }

    #[test]
    fn filter_keeps_row_ids_and_leaves_source_alone() {
        let table = sample();
        let before = table.clone();
        let view = table.filter(|row| row.text("brand").starts_with('G'));
        assert_eq!(view.len(), 1);
        assert_eq!(view.rows()[0].id, RowId(1));
        assert_eq!(table, before);
    }

    #[test]
    fn set_cell_extends_schema_and_rejects_unknown_rows() {
        let mut table = sample();
        table
            .set_cell(RowId(0), "status", "Reviewed")
            .expect("set status");
        assert!(table.has_column("status"));
        assert_eq!(table.text(RowId(0), "status"), "Reviewed");
        assert_eq!(
            table.set_cell(RowId(42), "status", "Reviewed"),
            Err(TableError::RowNotFound(RowId(42)))
        );
    }

    #[test]
    fn fill_column_touches_every_row() {
        let mut table = sample();
        table.fill_column("priority", "high").expect("fill");
        assert!(table.rows().iter().all(|row| row.text("priority") == "high"));
    }

    #[test]
    fn find_row_by_fido_matches_trimmed_ids() {
        let table = sample();
        assert_eq!(table.find_row_by_fido(" F-2"), Some(RowId(1)));
        assert_eq!(table.find_row_by_fido("F-9"), None);
    }

    #[test]
    fn numbers_render_without_trailing_zeroes() {
        assert_eq!(CellValue::Number(12.0).as_text(), "12");
        assert_eq!(CellValue::Number(12.5).as_text(), "12.5");
        assert_eq!(CellValue::Bool(true).as_text(), "true");
    }

    #[test]
    fn row_ids_are_not_reused_after_serialization() {
        let table = sample();
        let json = serde_json::to_string(&table).expect("serialize");
        let mut back: RecordTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, table);
        let id = back.push_row([("fido_id", "F-4")]);
        assert_eq!(id, RowId(3));
    }
}
