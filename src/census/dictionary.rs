//! The ACS variable dictionary: code → (Measure, Category, Subcategory,
//! Variable), decoded from the published HTML variable table.

use std::{collections::BTreeMap, fmt, sync::{Arc, LazyLock}};

use ahash::AHashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::{Error, Result},
    fetch,
    memo::MemoCache,
};

/// ACS 5-year data-profile variables.
pub const DEFAULT_DICTIONARY_URL: &str = "https://api.census.gov/data/2023/acs/acs5/profile/variables.html";

/// Hierarchy separator inside Census labels.
pub const SEPARATOR: &str = "!!";

static ROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("valid regex"));
static CELL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<t([hd])[^>]*>(.*?)</t[hd]>").expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid regex"));

/// A decomposed Census label.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableLabel {
    pub measure: String,
    pub category: String,
    pub subcategory: String,
    pub variable: String,
}

impl VariableLabel {
    pub fn new(measure: &str, category: &str, subcategory: &str, variable: &str) -> Self {
        Self {
            measure: measure.to_string(),
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            variable: variable.to_string(),
        }
    }
}

impl fmt::Display for VariableLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [&self.measure, &self.category, &self.subcategory, &self.variable];
        let shown: Vec<&str> = parts.iter().map(|s| s.as_str()).filter(|s| !s.is_empty()).collect();
        write!(f, "{}", shown.join(SEPARATOR))
    }
}

/// Split a label on "!!" into the four-field template. Extra segments are
/// merged into Variable with ": "; a Subcategory without a Variable gets
/// Variable "Total".
pub fn decompose_label(label: &str) -> VariableLabel {
    let segments: Vec<&str> = label.split(SEPARATOR).map(str::trim).collect();
    let field = |i: usize| segments.get(i).copied().unwrap_or_default().to_string();

    let mut decomposed = VariableLabel {
        measure: field(0),
        category: field(1),
        subcategory: field(2),
        variable: if segments.len() > 4 { segments[3..].join(": ") } else { field(3) },
    };
    if !decomposed.subcategory.is_empty() && decomposed.variable.is_empty() {
        decomposed.variable = "Total".to_string();
    }
    decomposed
}

/// Decoded dictionary, ordered by code.
#[derive(Debug, Clone, Default)]
pub struct VariableDictionary {
    entries: BTreeMap<String, VariableLabel>,
    by_label: AHashMap<VariableLabel, String>,
}

impl VariableDictionary {
    /// Build from (code, raw label) pairs, keeping only hierarchical labels.
    pub fn from_pairs<I, C, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: AsRef<str>,
    {
        let mut dict = Self::default();
        for (code, label) in pairs {
            let label = label.as_ref();
            if !label.contains(SEPARATOR) { continue }
            let code = code.into();
            let decomposed = decompose_label(label);
            dict.by_label.entry(decomposed.clone()).or_insert_with(|| code.clone());
            dict.entries.insert(code, decomposed);
        }
        dict
    }

    /// Parse the published HTML variable table.
    pub fn from_html(html: &str) -> Result<Self> {
        let pairs = parse_variable_table(html);
        let dict = Self::from_pairs(pairs);
        if dict.is_empty() {
            return Err(Error::EmptyPayload("ACS variable dictionary".to_string()));
        }
        log::debug!("[census::dictionary] decoded {} variables", dict.len());
        Ok(dict)
    }

    /// Fetch and decode once per URL for the life of `cache`.
    pub fn fetch(url: &Url, cache: &MemoCache) -> Result<Arc<Self>> {
        cache.get_or_try_insert("census::dictionary", url.as_str().as_bytes(), || {
            log::info!("[census::dictionary] fetching {url}");
            Self::from_html(&fetch::fetch_text(url)?)
        })
    }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    #[inline] pub fn get(&self, code: &str) -> Option<&VariableLabel> { self.entries.get(code) }

    /// First code registered with this label.
    #[inline] pub fn code_for(&self, label: &VariableLabel) -> Option<&str> { self.by_label.get(label).map(String::as_str) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableLabel)> {
        self.entries.iter().map(|(code, label)| (code.as_str(), label))
    }
}

/// Extract (Name, Label) pairs from an HTML table whose header row names
/// those columns. Without a recognisable header, the first two cells are used.
pub fn parse_variable_table(html: &str) -> Vec<(String, String)> {
    let mut name_idx = 0;
    let mut label_idx = 1;
    let mut pairs = Vec::new();

    for row in ROW.captures_iter(html) {
        let cells: Vec<(bool, String)> = CELL.captures_iter(&row[1])
            .map(|c| (&c[1] == "h" || &c[1] == "H", cell_text(&c[2])))
            .collect();
        if cells.is_empty() { continue }

        if cells.iter().all(|(header, _)| *header) {
            let find = |want: &str| cells.iter().position(|(_, t)| t.eq_ignore_ascii_case(want));
            if let (Some(n), Some(l)) = (find("Name"), find("Label")) {
                name_idx = n;
                label_idx = l;
            }
            continue;
        }

        if let (Some((_, name)), Some((_, label))) = (cells.get(name_idx), cells.get(label_idx)) {
            if !name.is_empty() {
                pairs.push((name.clone(), label.clone()));
            }
        }
    }
    pairs
}

fn cell_text(inner: &str) -> String {
    let stripped = TAG.replace_all(inner, "");
    let decoded = ENTITY.replace_all(&stripped, |caps: &regex::Captures| decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string()));
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entity(entity: &str) -> Option<String> {
    let ch = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        e if e.starts_with("#x") || e.starts_with("#X") => char::from_u32(u32::from_str_radix(&e[2..], 16).ok()?)?,
        e if e.starts_with('#') => char::from_u32(e[1..].parse().ok()?)?,
        _ => return None,
    };
    Some(ch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><table>
        <thead><tr><th>Name</th><th>Label</th><th>Concept</th></tr></thead>
        <tbody>
        <tr><td><a id="for">for</a></td><td>Census API FIPS 'for' clause</td><td>Census API Geography Specification</td></tr>
        <tr><td><a name="DP04_0046E">DP04_0046E</a></td><td>Estimate!!HOUSING TENURE!!Occupied housing units!!Owner-occupied</td><td>SELECTED HOUSING</td></tr>
        <tr><td>DP04_0002E</td><td>Estimate!!HOUSING OCCUPANCY!!Total housing units</td><td></td></tr>
        <tr><td>DP03_0062E</td><td>Estimate!!INCOME AND BENEFITS (IN 2023 INFLATION-ADJUSTED DOLLARS)!!Total households!!Median household income (dollars)</td><td></td></tr>
        <tr><td>DP05_0001E</td><td>Estimate!!SEX &amp; AGE!!Total population!!Male!!Under 5</td><td></td></tr>
        </tbody></table></body></html>"#;

    #[test]
    fn keeps_only_hierarchical_labels() {
        let dict = VariableDictionary::from_html(PAGE).unwrap();
        assert_eq!(dict.len(), 4);
        assert!(dict.get("for").is_none());
    }

    #[test]
    fn decomposes_into_the_template() {
        let dict = VariableDictionary::from_html(PAGE).unwrap();
        assert_eq!(dict.get("DP04_0046E"), Some(&VariableLabel::new(
            "Estimate", "HOUSING TENURE", "Occupied housing units", "Owner-occupied",
        )));
        assert_eq!(dict.get("DP05_0001E").map(|l| l.variable.as_str()), Some("Male: Under 5"));
        assert_eq!(dict.get("DP05_0001E").map(|l| l.category.as_str()), Some("SEX & AGE"));
    }

    #[test]
    fn subcategory_without_variable_is_total() {
        let label = decompose_label("Estimate!!HOUSING OCCUPANCY!!Total housing units");
        assert_eq!(label.subcategory, "Total housing units");
        assert_eq!(label.variable, "Total");
        assert_eq!(decompose_label("Estimate!!Total").variable, "");
    }

    #[test]
    fn reverse_lookup() {
        let dict = VariableDictionary::from_html(PAGE).unwrap();
        let label = decompose_label("Estimate!!HOUSING TENURE!!Occupied housing units!!Owner-occupied");
        assert_eq!(dict.code_for(&label), Some("DP04_0046E"));
    }

    #[test]
    fn page_without_variables_is_empty() {
        assert!(matches!(VariableDictionary::from_html("<p>maintenance</p>"), Err(Error::EmptyPayload(_))));
    }
}
