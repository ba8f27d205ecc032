//! American Community Survey tables: the variable dictionary, the
//! wide-to-long tidier and semantic metrics over tidy records.
mod dictionary;
mod metrics;
mod tidy;

pub use dictionary::{decompose_label, parse_variable_table, VariableDictionary, VariableLabel, DEFAULT_DICTIONARY_URL, SEPARATOR};
pub use metrics::{MetricDefinitions, MetricExpr};
pub use tidy::{split_census_name, split_name, tidy, tidy_dataset, tidy_geo, widen, CensusName};

use serde::{Deserialize, Serialize};

/// Identifier columns carried through the pivot.
pub const GEOID: &str = "GEOID";
pub const NAME: &str = "NAME";
pub const JURISDICTION: &str = "Jurisdiction";
pub const COUNTY: &str = "County";

/// Tidy record columns.
pub const MEASURE: &str = "Measure";
pub const CATEGORY: &str = "Category";
pub const SUBCATEGORY: &str = "Subcategory";
pub const VARIABLE: &str = "Variable";
pub const VALUE: &str = "Value";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CensusConfig {
    pub dictionary_url: String,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self { dictionary_url: DEFAULT_DICTIONARY_URL.to_string() }
    }
}
