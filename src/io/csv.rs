//! CSV reading.

use std::io::Cursor;

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::{CsvParseOptions, CsvReadOptions}};

/// Read CSV bytes with a header row, letting polars infer column dtypes.
pub(super) fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(false))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .context("[io::csv] failed to parse CSV")
}
