//! JSON reading. Accepts a list of records, a column-to-list mapping, or
//! the column-to-{index: value} layout that pandas writes by default.

use anyhow::{bail, Context, Result};
use polars::frame::DataFrame;
use serde_json::{Map, Value};

use crate::table::{column_from_cells, Cell, ColumnsBuilder};

pub(super) fn read_json_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let value: Value = serde_json::from_slice(bytes).context("[io::json] invalid JSON")?;
    match value {
        Value::Array(records) => read_records(&records),
        Value::Object(columns) => read_columns(&columns),
        _ => bail!("[io::json] expected a list of records or an object of columns"),
    }
}

fn read_records(records: &[Value]) -> Result<DataFrame> {
    let mut builder = ColumnsBuilder::default();
    for (i, record) in records.iter().enumerate() {
        let Value::Object(fields) = record else {
            bail!("[io::json] record {i} is not an object");
        };
        builder.push_row(fields.iter().map(|(k, v)| (k.as_str(), Cell::from_json(v))));
    }
    Ok(builder.finish()?)
}

fn read_columns(columns: &Map<String, Value>) -> Result<DataFrame> {
    let mut height = None;
    let mut out = Vec::with_capacity(columns.len());

    for (name, values) in columns {
        let cells = match values {
            Value::Array(items) => items.iter().map(Cell::from_json).collect::<Vec<_>>(),
            Value::Object(indexed) => indexed_cells(name, indexed)?,
            _ => bail!("[io::json] column {name} is neither a list nor an index mapping"),
        };
        match height {
            None => height = Some(cells.len()),
            Some(h) if h != cells.len() => {
                bail!("[io::json] column {name} has {} values, expected {h}", cells.len())
            }
            _ => {}
        }
        out.push(column_from_cells(name, &cells));
    }

    Ok(DataFrame::new(out)?)
}

/// Order `{"0": .., "1": .., "10": ..}` numerically; non-numeric keys keep
/// their document order after the numeric ones.
fn indexed_cells(name: &str, indexed: &Map<String, Value>) -> Result<Vec<Cell>> {
    let mut entries: Vec<(Option<u64>, usize, &Value)> = indexed.iter().enumerate()
        .map(|(pos, (k, v))| (k.parse::<u64>().ok(), pos, v))
        .collect();
    if entries.iter().any(|(idx, ..)| idx.is_none()) {
        log::debug!("[io::json] column {name} has non-numeric row keys");
    }
    entries.sort_by_key(|(idx, pos, _)| (idx.is_none(), *idx, *pos));
    Ok(entries.into_iter().map(|(.., v)| Cell::from_json(v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::DataType;

    #[test]
    fn list_of_records() {
        let df = read_json_bytes(br#"[{"town":"Barre","n":1},{"town":"Stowe","n":2.5,"extra":true}]"#).unwrap();
        assert_eq!(df.get_column_names(), ["town", "n", "extra"]);
        assert_eq!(df.column("n").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("extra").unwrap().null_count(), 1);
    }

    #[test]
    fn pandas_index_layout_sorts_numerically() {
        let payload = br#"{"town":{"0":"a","2":"c","10":"k","1":"b"},"n":{"0":0,"1":1,"2":2,"10":10}}"#;
        let df = read_json_bytes(payload).unwrap();
        let towns: Vec<_> = df.column("town").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(towns, ["a", "b", "c", "k"]);
    }

    #[test]
    fn column_lists() {
        let df = read_json_bytes(br#"{"a":[1,2,3],"b":["x",null,"z"]}"#).unwrap();
        assert_eq!(df.shape(), (3, 2));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        assert!(read_json_bytes(br#"{"a":[1,2],"b":[1]}"#).is_err());
    }
}
