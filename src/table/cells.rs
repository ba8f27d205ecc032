use ahash::AHashMap;
use polars::prelude::*;

/// A loosely typed value collected from a record-oriented source before the
/// column dtype is known.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Interpret a JSON scalar; nested values are kept as their JSON text.
    pub(crate) fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map_or(Cell::Null, Cell::Float),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub(crate) fn to_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind { Null, Bool, Int, Float, Text }

/// Build a typed column from cells: all-bool → Boolean, all-int → Int64,
/// ints and floats → Float64, anything mixed with text → String.
pub(crate) fn column_from_cells(name: &str, cells: &[Cell]) -> Column {
    let kind = cells.iter().fold(Kind::Null, |kind, cell| match (kind, cell) {
        (k, Cell::Null) => k,
        (Kind::Null | Kind::Bool, Cell::Bool(_)) => Kind::Bool,
        (Kind::Null | Kind::Int, Cell::Int(_)) => Kind::Int,
        (Kind::Null | Kind::Int | Kind::Float, Cell::Int(_) | Cell::Float(_)) => Kind::Float,
        _ => Kind::Text,
    });

    match kind {
        Kind::Bool => Column::new(name.into(), cells.iter()
            .map(|cell| match cell { Cell::Bool(b) => Some(*b), _ => None })
            .collect::<Vec<_>>()),
        Kind::Int => Column::new(name.into(), cells.iter()
            .map(|cell| match cell { Cell::Int(i) => Some(*i), _ => None })
            .collect::<Vec<_>>()),
        Kind::Float => Column::new(name.into(), cells.iter()
            .map(|cell| match cell {
                Cell::Int(i) => Some(*i as f64),
                Cell::Float(f) => Some(*f),
                _ => None,
            })
            .collect::<Vec<_>>()),
        Kind::Null | Kind::Text => Column::new(name.into(), cells.iter()
            .map(Cell::to_text)
            .collect::<Vec<_>>()),
    }
}

/// Accumulates rows of (name, cell) pairs whose key sets may differ between
/// rows, keeping columns in first-seen order and padding gaps with nulls.
#[derive(Debug, Default)]
pub(crate) struct ColumnsBuilder {
    names: Vec<String>,
    index: AHashMap<String, usize>,
    cells: Vec<Vec<Cell>>,
    rows: usize,
}

impl ColumnsBuilder {
    /// Start with a known column order (e.g. from a file header).
    pub(crate) fn with_columns<S: AsRef<str>>(names: &[S]) -> Self {
        let mut builder = Self::default();
        for name in names { builder.column_index(name.as_ref()); }
        builder
    }

    fn column_index(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) { return i }
        let i = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), i);
        self.cells.push(vec![Cell::Null; self.rows]);
        i
    }

    /// Append one row.
    pub(crate) fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = (S, Cell)>,
        S: AsRef<str>,
    {
        for column in &mut self.cells { column.push(Cell::Null); }
        self.rows += 1;
        for (name, cell) in row {
            let i = self.column_index(name.as_ref());
            self.cells[i][self.rows - 1] = cell;
        }
    }

    /// Number of rows appended so far.
    pub(crate) fn rows(&self) -> usize { self.rows }

    pub(crate) fn finish(self) -> PolarsResult<DataFrame> {
        DataFrame::new(self.names.iter().zip(&self.cells)
            .map(|(name, cells)| column_from_cells(name, cells))
            .collect())
    }
}
