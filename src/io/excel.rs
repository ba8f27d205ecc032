//! Spreadsheet reading via calamine. Only the first worksheet is read; its
//! first row is the header.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDate, TimeDelta};
use polars::frame::DataFrame;

use crate::table::{column_from_cells, Cell};

pub(super) fn read_excel_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("[io::excel] failed to open workbook")?;
    let range = workbook.worksheet_range_at(0)
        .ok_or_else(|| anyhow!("[io::excel] workbook has no worksheets"))?
        .context("[io::excel] failed to read first worksheet")?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else { return Ok(DataFrame::empty()) };
    let names: Vec<String> = header.iter().enumerate()
        .map(|(i, cell)| match cell_to_cell(cell) {
            Cell::Null => format!("column_{}", i + 1),
            other => other.to_text().unwrap_or_default(),
        })
        .collect();

    let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(row.get(i).map_or(Cell::Null, cell_to_cell));
        }
    }

    Ok(DataFrame::new(names.iter().zip(&columns)
        .map(|(name, cells)| column_from_cells(name, cells))
        .collect())?)
}

fn cell_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Bool(b) => Cell::Bool(*b),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => serial_to_text(dt.as_f64()).map_or(Cell::Null, Cell::Text),
        #[allow(unreachable_patterns)]
        _ => Cell::Null,
    }
}

/// Render an Excel serial date (days since 1899-12-30) as
/// `YYYY-MM-DD HH:MM:SS` so the cleaner can parse it.
fn serial_to_text(serial: f64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let dt = epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)?;
    Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_dates() {
        assert_eq!(serial_to_text(44_197.0).as_deref(), Some("2021-01-01 00:00:00"));
        assert_eq!(serial_to_text(44_197.5).as_deref(), Some("2021-01-01 12:00:00"));
    }

    #[test]
    fn garbage_is_a_read_error() {
        assert!(read_excel_bytes(b"definitely not a workbook").is_err());
    }
}
