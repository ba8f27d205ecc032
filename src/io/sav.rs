//! SPSS system-file (`.sav`) reading.
//!
//! Supports the uncompressed and bytecode-compressed layouts in either byte
//! order. Values are returned raw; variable and value labels are kept as
//! metadata next to the frame rather than substituted into it.

use std::collections::BTreeMap;

use anyhow::{bail, ensure, Context, Result};
use polars::prelude::*;

/// System-missing marker: the most negative finite double.
const SYSMIS: f64 = -f64::MAX;

/// A decoded system file.
#[derive(Debug, Clone)]
pub struct SavTable {
    data: DataFrame,
    variable_labels: BTreeMap<String, String>,
    value_labels: BTreeMap<String, BTreeMap<String, String>>,
}

impl SavTable {
    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn into_data(self) -> DataFrame { self.data }

    /// Variable name → descriptive label.
    #[inline] pub fn variable_labels(&self) -> &BTreeMap<String, String> { &self.variable_labels }

    /// Variable name → (raw value rendered as text → label).
    #[inline] pub fn value_labels(&self) -> &BTreeMap<String, BTreeMap<String, String>> { &self.value_labels }
}

struct Variable {
    name: String,
    /// 0 for numeric, otherwise string width in bytes.
    width: usize,
    label: Option<String>,
    /// 1-based position in the dictionary, counting continuation records.
    dict_index: usize,
}

impl Variable {
    #[inline] fn segments(&self) -> usize { if self.width == 0 { 1 } else { self.width.div_ceil(8) } }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        ensure!(self.pos + n <= self.bytes.len(), "[io::sav] unexpected end of file at byte {}", self.pos);
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn i32(&mut self) -> Result<i32> {
        let raw = self.array::<4>()?;
        Ok(if self.big_endian { i32::from_be_bytes(raw) } else { i32::from_le_bytes(raw) })
    }

    fn f64_from(&self, raw: [u8; 8]) -> f64 {
        if self.big_endian { f64::from_be_bytes(raw) } else { f64::from_le_bytes(raw) }
    }

    fn f64(&mut self) -> Result<f64> {
        let raw = self.array::<8>()?;
        Ok(self.f64_from(raw))
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let n = self.i32()?;
        usize::try_from(n).with_context(|| format!("[io::sav] negative {what} count {n}"))
    }

    #[inline] fn remaining(&self) -> usize { self.bytes.len() - self.pos }
}

fn text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end_matches([' ', '\0']).to_string()
}

/// Decode a system file.
pub fn read_sav(bytes: &[u8]) -> Result<SavTable> {
    ensure!(bytes.len() >= 176, "[io::sav] file is too short for a system-file header");
    match &bytes[..4] {
        b"$FL2" => {}
        b"$FL3" => bail!("[io::sav] zlib-compressed system files are not supported"),
        _ => bail!("[io::sav] not an SPSS system file"),
    }

    let layout = [bytes[64], bytes[65], bytes[66], bytes[67]];
    let big_endian = !matches!(i32::from_le_bytes(layout), 2 | 3);
    let mut r = ByteReader { bytes, pos: 64, big_endian };

    let _layout_code = r.i32()?;
    let _nominal_case_size = r.i32()?;
    let compression = r.i32()?;
    let _weight_index = r.i32()?;
    let ncases = r.i32()?;
    let bias = r.f64()?;
    r.take(9 + 8 + 64 + 3)?;

    let mut variables: Vec<Variable> = Vec::new();
    let mut dict_len = 0usize;
    let mut pending_labels: Vec<(Vec<[u8; 8]>, Vec<String>)> = Vec::new();
    let mut value_label_targets: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut long_names: BTreeMap<String, String> = BTreeMap::new();

    loop {
        match r.i32()? {
            2 => {
                let var_type = r.i32()?;
                let has_label = r.i32()?;
                let n_missing = r.i32()?;
                let _print = r.i32()?;
                let _write = r.i32()?;
                let name = text(r.take(8)?);
                let label = if has_label == 1 {
                    let len = r.count("label length")?;
                    Some(text(r.take(len.div_ceil(4) * 4)?.get(..len).unwrap_or_default()))
                } else {
                    None
                };
                r.take(n_missing.unsigned_abs() as usize * 8)?;

                dict_len += 1;
                if var_type >= 0 {
                    variables.push(Variable { name, width: var_type as usize, label, dict_index: dict_len });
                }
            }
            3 => {
                let count = r.count("value label")?;
                let mut values = Vec::with_capacity(count);
                let mut labels = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(r.array::<8>()?);
                    let len = r.take(1)?[0] as usize;
                    let padded = (len + 1).div_ceil(8) * 8 - 1;
                    labels.push(text(&r.take(padded)?[..len]));
                }
                ensure!(r.i32()? == 4, "[io::sav] value labels not followed by a variable index record");
                let n_vars = r.count("value label variable")?;
                let targets = (0..n_vars)
                    .map(|_| r.count("variable index"))
                    .collect::<Result<Vec<_>>>()?;
                value_label_targets.push((pending_labels.len(), targets));
                pending_labels.push((values, labels));
            }
            6 => {
                let lines = r.count("document line")?;
                r.take(lines * 80)?;
            }
            7 => {
                let subtype = r.i32()?;
                let size = r.count("extension element size")?;
                let count = r.count("extension element")?;
                let data = r.take(size * count)?;
                if subtype == 13 {
                    for pair in String::from_utf8_lossy(data).split('\t') {
                        if let Some((short, long)) = pair.split_once('=') {
                            long_names.insert(short.trim().to_string(), long.trim().to_string());
                        }
                    }
                }
            }
            999 => {
                r.i32()?;
                break;
            }
            other => bail!("[io::sav] unknown record type {other} at byte {}", r.pos - 4),
        }
    }

    for var in &mut variables {
        if let Some(long) = long_names.get(&var.name) { var.name = long.clone(); }
    }

    let mut value_labels: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for (set, targets) in value_label_targets {
        let (values, labels) = &pending_labels[set];
        for target in targets {
            let Some(var) = variables.iter().find(|v| v.dict_index == target) else { continue };
            let entry = value_labels.entry(var.name.clone()).or_default();
            for (raw, label) in values.iter().zip(labels) {
                let key = if var.width == 0 { format_number(r.f64_from(*raw)) } else { text(raw) };
                entry.insert(key, label.clone());
            }
        }
    }

    let rows = match compression {
        0 => read_uncompressed(&mut r, &variables, ncases)?,
        1 => read_bytecode(&mut r, &variables, ncases, bias)?,
        other => bail!("[io::sav] unsupported compression code {other}"),
    };
    log::debug!("[io::sav] {} variables, {} cases", variables.len(), rows.len());

    let columns = variables.iter().enumerate()
        .map(|(i, var)| -> Column {
            if var.width == 0 {
                let values: Vec<Option<f64>> = rows.iter()
                    .map(|row| match &row[i] { Value::Number(v) => *v, Value::Text(_) => None })
                    .collect();
                Column::new(var.name.as_str().into(), values)
            } else {
                let values: Vec<Option<String>> = rows.iter()
                    .map(|row| match &row[i] { Value::Text(s) => Some(s.clone()), Value::Number(_) => None })
                    .collect();
                Column::new(var.name.as_str().into(), values)
            }
        })
        .collect();

    let variable_labels = variables.iter()
        .filter_map(|v| v.label.clone().map(|l| (v.name.clone(), l)))
        .collect();

    Ok(SavTable { data: DataFrame::new(columns)?, variable_labels, value_labels })
}

enum Value {
    Number(Option<f64>),
    Text(String),
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 { format!("{}", v as i64) } else { v.to_string() }
}

fn numeric(v: f64) -> Option<f64> {
    (v != SYSMIS && !v.is_nan()).then_some(v)
}

fn read_uncompressed(r: &mut ByteReader, variables: &[Variable], ncases: i32) -> Result<Vec<Vec<Value>>> {
    let case_bytes: usize = variables.iter().map(|v| v.segments() * 8).sum();
    let mut rows = Vec::new();
    while (ncases < 0 || rows.len() < ncases as usize) && case_bytes > 0 && r.remaining() >= case_bytes {
        let row = variables.iter()
            .map(|var| -> Result<Value> {
                Ok(if var.width == 0 {
                    Value::Number(numeric(r.f64()?))
                } else {
                    let raw = r.take(var.segments() * 8)?;
                    Value::Text(text(&raw[..var.width]))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(row);
    }
    Ok(rows)
}

enum Element {
    Raw([u8; 8]),
    Number(f64),
    Spaces,
    Sysmis,
}

/// Cursor over bytecode-compressed data: blocks of eight command bytes, each
/// followed by the raw 8-byte values the commands call for.
struct Bytecode {
    commands: [u8; 8],
    next: usize,
    bias: f64,
}

impl Bytecode {
    fn element(&mut self, r: &mut ByteReader) -> Result<Option<Element>> {
        loop {
            if self.next == 8 {
                if r.remaining() < 8 { return Ok(None) }
                self.commands = r.array::<8>()?;
                self.next = 0;
            }
            let code = self.commands[self.next];
            self.next += 1;
            return Ok(Some(match code {
                0 => continue,
                252 => return Ok(None),
                253 => Element::Raw(r.array::<8>()?),
                254 => Element::Spaces,
                255 => Element::Sysmis,
                n => Element::Number(n as f64 - self.bias),
            }));
        }
    }
}

fn read_bytecode(r: &mut ByteReader, variables: &[Variable], ncases: i32, bias: f64) -> Result<Vec<Vec<Value>>> {
    let mut codes = Bytecode { commands: [0; 8], next: 8, bias };
    let mut rows = Vec::new();

    'cases: while ncases < 0 || rows.len() < ncases as usize {
        let mut row = Vec::with_capacity(variables.len());
        for (i, var) in variables.iter().enumerate() {
            if var.width == 0 {
                let value = match codes.element(r)? {
                    None if i == 0 => break 'cases,
                    None => bail!("[io::sav] data ends in the middle of a case"),
                    Some(Element::Number(v)) => Some(v),
                    Some(Element::Raw(raw)) => numeric(r.f64_from(raw)),
                    Some(Element::Sysmis | Element::Spaces) => None,
                };
                row.push(Value::Number(value));
            } else {
                let mut raw = Vec::with_capacity(var.segments() * 8);
                for segment in 0..var.segments() {
                    match codes.element(r)? {
                        None if i == 0 && segment == 0 => break 'cases,
                        None => bail!("[io::sav] data ends in the middle of a case"),
                        Some(Element::Raw(bytes)) => raw.extend_from_slice(&bytes),
                        Some(_) => raw.extend_from_slice(b"        "),
                    }
                }
                row.push(Value::Text(text(&raw[..var.width])));
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Little-endian system-file writer covering the records the reader uses.
    struct SavWriter { buf: Vec<u8> }

    impl SavWriter {
        fn new(compression: i32, ncases: i32) -> Self {
            let mut buf = Vec::new();
            buf.extend_from_slice(b"$FL2");
            buf.extend_from_slice(&[b' '; 60]);
            for v in [2i32, -1, compression, 0, ncases] { buf.extend_from_slice(&v.to_le_bytes()); }
            buf.extend_from_slice(&100.0f64.to_le_bytes());
            buf.extend_from_slice(&[b' '; 9 + 8 + 64 + 3]);
            Self { buf }
        }

        fn i32(&mut self, v: i32) -> &mut Self { self.buf.extend_from_slice(&v.to_le_bytes()); self }

        fn f64(&mut self, v: f64) -> &mut Self { self.buf.extend_from_slice(&v.to_le_bytes()); self }

        fn raw(&mut self, bytes: &[u8]) -> &mut Self { self.buf.extend_from_slice(bytes); self }

        fn variable(&mut self, name: &str, width: i32, label: Option<&str>) -> &mut Self {
            let mut short = [b' '; 8];
            short[..name.len()].copy_from_slice(name.as_bytes());
            self.i32(2).i32(width).i32(label.is_some() as i32).i32(0).i32(0).i32(0).raw(&short);
            if let Some(label) = label {
                self.i32(label.len() as i32).raw(label.as_bytes());
                let pad = label.len().div_ceil(4) * 4 - label.len();
                self.raw(&vec![b' '; pad]);
            }
            for _ in 1..(width.max(1) as usize).div_ceil(8) {
                self.i32(2).i32(-1).i32(0).i32(0).i32(0).i32(0).raw(&[b' '; 8]);
            }
            self
        }

        fn end_dictionary(&mut self) -> &mut Self { self.i32(999).i32(0) }
    }

    fn two_variable_dictionary(w: &mut SavWriter) {
        w.variable("AGE", 0, Some("Age in years")).variable("TOWN", 8, None);
        // Value labels for AGE: 1 => "one".
        w.i32(3).i32(1).f64(1.0).raw(&[3]).raw(b"one    ").i32(4).i32(1).i32(1);
        // Long name for TOWN.
        let names = b"AGE=Age\tTOWN=TownName";
        w.i32(7).i32(13).i32(1).i32(names.len() as i32).raw(names);
        w.end_dictionary();
    }

    #[test]
    fn uncompressed_cases() {
        let mut w = SavWriter::new(0, 2);
        two_variable_dictionary(&mut w);
        w.f64(34.0).raw(b"Barre   ").f64(SYSMIS).raw(b"Stowe   ");

        let table = read_sav(&w.buf).unwrap();
        assert_eq!(table.data().get_column_names(), ["Age", "TownName"]);
        let ages: Vec<_> = table.data().column("Age").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(ages, [Some(34.0), None]);
        let towns: Vec<_> = table.data().column("TownName").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(towns, ["Barre", "Stowe"]);
        assert_eq!(table.variable_labels().get("Age").map(String::as_str), Some("Age in years"));
        assert_eq!(table.value_labels()["Age"].get("1").map(String::as_str), Some("one"));
    }

    #[test]
    fn bytecode_compressed_cases() {
        let mut w = SavWriter::new(1, -1);
        two_variable_dictionary(&mut w);
        // Case 1: 5 via bias (105), raw text. Case 2: sysmis, raw text. Then EOF.
        w.raw(&[105, 253, 255, 253, 252, 0, 0, 0]).raw(b"Barre   ").raw(b"Stowe   ");

        let table = read_sav(&w.buf).unwrap();
        assert_eq!(table.data().height(), 2);
        let ages: Vec<_> = table.data().column("Age").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(ages, [Some(5.0), None]);
    }

    #[test]
    fn rejects_other_files() {
        assert!(read_sav(&[0u8; 200]).is_err());
        assert!(read_sav(b"$FL2").is_err());
    }
}
