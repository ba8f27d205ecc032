//! Cascading hierarchical selection over an ordered list of columns.
//!
//! The options offered at each level are the values that actually co-occur
//! with the selections made at the levels above it. The "All" sentinel only
//! exists in what [`FilterState`] shows; selections never contain it.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result, Warning},
    table::{text_values, Tabular},
};

/// Sentinel meaning "every option at this level".
pub const ALL: &str = "All";

/// One level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub column: String,
    #[serde(default)]
    pub allow_all: bool,
    #[serde(default)]
    pub default: Option<String>,
}

impl LevelSpec {
    pub fn new(column: impl Into<String>) -> Self {
        Self { column: column.into(), allow_all: false, default: None }
    }

    /// Offer the "All" option first. On such a level a data value spelled
    /// "All" is not listed separately: selecting "All" always means every
    /// option, the literal value included.
    pub fn with_all(mut self) -> Self {
        self.allow_all = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    children: Vec<(String, Node)>,
    index: AHashMap<String, usize>,
}

impl Node {
    fn child_mut(&mut self, value: &str) -> &mut Node {
        let i = match self.index.get(value) {
            Some(&i) => i,
            None => {
                self.children.push((value.to_string(), Node::default()));
                self.index.insert(value.to_string(), self.children.len() - 1);
                self.children.len() - 1
            }
        };
        &mut self.children[i].1
    }
}

/// What the presentation layer renders for one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelView {
    pub column: String,
    /// Options in first-seen order, with [`ALL`] first when enabled.
    pub options: Vec<String>,
    pub default: Option<String>,
    /// Expanded selection; never contains the sentinel.
    pub selected: Vec<String>,
}

/// Resolved selections for every level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    levels: Vec<LevelView>,
    warnings: Vec<Warning>,
}

impl FilterState {
    #[inline] pub fn levels(&self) -> &[LevelView] { &self.levels }

    #[inline] pub fn warnings(&self) -> &[Warning] { &self.warnings }

    /// Expanded selection for a hierarchy column.
    pub fn selections(&self, column: &str) -> Option<&[String]> {
        self.levels.iter().find(|l| l.column == column).map(|l| l.selected.as_slice())
    }

    /// True when some level has nothing selected, which empties every table.
    pub fn is_empty(&self) -> bool {
        self.levels.iter().any(|l| l.selected.is_empty())
    }
}

/// Selector built once from a table; never mutates it.
#[derive(Debug, Clone)]
pub struct CascadingFilter {
    levels: Vec<LevelSpec>,
    root: Node,
}

impl CascadingFilter {
    /// Build the co-occurrence tree. Every hierarchy column must exist in `table`.
    pub fn new<T: Tabular>(table: &T, levels: Vec<LevelSpec>) -> Result<Self> {
        let df = table.frame();
        let columns = levels.iter()
            .map(|level| df.column(&level.column)
                .map_err(|_| Error::MissingColumn(level.column.clone()))
                .and_then(text_values))
            .collect::<Result<Vec<_>>>()?;

        let mut root = Node::default();
        for row in 0..df.height() {
            let mut node = &mut root;
            for values in &columns {
                let Some(value) = values[row].as_deref() else { break };
                node = node.child_mut(value);
            }
        }
        Ok(Self { levels, root })
    }

    #[inline] pub fn levels(&self) -> &[LevelSpec] { &self.levels }

    /// Expand raw per-level input (aligned with the hierarchy; missing or
    /// empty entries take the level default) into a filter state.
    pub fn resolve(&self, raw: &[Vec<String>]) -> FilterState {
        let mut frontier: Vec<&Node> = vec![&self.root];
        let mut views = Vec::with_capacity(self.levels.len());
        let mut warnings = Vec::new();

        for (k, spec) in self.levels.iter().enumerate() {
            let mut options: Vec<&str> = Vec::new();
            let mut seen = AHashSet::new();
            for node in frontier.iter().copied() {
                for (value, _) in &node.children {
                    if seen.insert(value.as_str()) { options.push(value) }
                }
            }

            if spec.allow_all && seen.contains(ALL) {
                log::warn!("[filter] {} holds a literal {ALL:?} value; it is read as the all-values option", spec.column);
            }

            let default = match &spec.default {
                Some(d) if options.contains(&d.as_str()) || (spec.allow_all && d == ALL) => Some(d.clone()),
                _ if spec.allow_all && !options.is_empty() => Some(ALL.to_string()),
                _ => options.first().map(|o| o.to_string()),
            };

            let requested: Vec<&str> = raw.get(k).into_iter().flatten()
                .map(String::as_str)
                .filter(|v| seen.contains(v) || (spec.allow_all && *v == ALL))
                .collect();
            let requested = if requested.is_empty() { default.as_deref().into_iter().collect() } else { requested };

            let selected: Vec<String> = if requested.contains(&ALL) {
                options.iter().map(|o| o.to_string()).collect()
            } else {
                let wanted: AHashSet<&str> = requested.into_iter().collect();
                options.iter().filter(|o| wanted.contains(*o)).map(|o| o.to_string()).collect()
            };

            if options.is_empty() {
                warnings.push(Warning::new("filter", format!(
                    "no {} values match the selections above it; the filtered table is empty", spec.column
                )));
            }

            let chosen: AHashSet<&str> = selected.iter().map(String::as_str).collect();
            frontier = frontier.iter().copied()
                .flat_map(|node| node.children.iter())
                .filter(|(value, _)| chosen.contains(value.as_str()))
                .map(|(_, child)| child)
                .collect();

            let mut shown: Vec<String> = Vec::with_capacity(options.len() + 1);
            if spec.allow_all && !options.is_empty() { shown.push(ALL.to_string()) }
            shown.extend(options.iter().filter(|o| !(spec.allow_all && **o == ALL)).map(|o| o.to_string()));

            views.push(LevelView { column: spec.column.clone(), options: shown, default, selected });
        }

        FilterState { levels: views, warnings }
    }

    /// Rows of `table` whose hierarchy values lie in the selections. Hierarchy
    /// columns absent from `table` are ignored.
    pub fn apply<T: Tabular>(&self, state: &FilterState, table: &T) -> Result<T> {
        let df = table.frame();
        if state.is_empty() {
            return table.filter_rows(&vec![false; df.height()]);
        }

        let mut mask = vec![true; df.height()];
        for level in state.levels() {
            let Ok(col) = df.column(&level.column) else {
                log::warn!("[filter] column {} not in table; level ignored", level.column);
                continue;
            };
            let allowed: AHashSet<&str> = level.selected.iter().map(String::as_str).collect();
            for (keep, value) in mask.iter_mut().zip(text_values(col)?) {
                *keep &= value.is_some_and(|v| allowed.contains(v.as_str()));
            }
        }
        table.filter_rows(&mask)
    }

    /// Apply one state to several related tables.
    pub fn apply_all<'a, T, I>(&self, state: &FilterState, tables: I) -> Result<Vec<T>>
    where
        T: Tabular + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        tables.into_iter().map(|t| self.apply(state, t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn rows() -> DataFrame {
        df!(
            "Category" => ["A", "A", "B"],
            "Subcategory" => ["x", "y", "x"],
            "Value" => [1i64, 2, 3],
        ).unwrap()
    }

    fn hierarchy() -> Vec<LevelSpec> {
        vec![LevelSpec::new("Category").with_all(), LevelSpec::new("Subcategory")]
    }

    fn sel(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn options_follow_the_prefix() {
        let filter = CascadingFilter::new(&rows(), hierarchy()).unwrap();
        let state = filter.resolve(&[sel(&["A"]), sel(&["y"])]);
        assert_eq!(state.levels()[0].options, sel(&["All", "A", "B"]));
        assert_eq!(state.levels()[1].options, sel(&["x", "y"]));

        let out = filter.apply(&state, &rows()).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(out.column("Value").unwrap().i64().unwrap().get(0), Some(2));
    }

    #[test]
    fn all_expands_to_every_option() {
        let filter = CascadingFilter::new(&rows(), hierarchy()).unwrap();
        let state = filter.resolve(&[sel(&["All"]), sel(&["x"])]);
        assert_eq!(state.selections("Category"), Some(&sel(&["A", "B"])[..]));
        assert_eq!(filter.apply(&state, &rows()).unwrap().height(), 2);
    }

    #[test]
    fn literal_all_value_is_covered_by_the_all_option() {
        let df = df!("Category" => ["All", "A", "B"], "Value" => [1i64, 2, 3]).unwrap();
        let filter = CascadingFilter::new(&df, vec![LevelSpec::new("Category").with_all()]).unwrap();

        let state = filter.resolve(&[sel(&["All"])]);
        assert_eq!(state.levels()[0].options, sel(&["All", "A", "B"]));
        assert_eq!(filter.apply(&state, &df).unwrap().height(), 3);

        let state = filter.resolve(&[sel(&["B"])]);
        assert_eq!(state.levels()[0].selected, sel(&["B"]));
        assert_eq!(filter.apply(&state, &df).unwrap().height(), 1);
    }

    #[test]
    fn defaults() {
        let filter = CascadingFilter::new(&rows(), vec![
            LevelSpec::new("Category").with_all().with_default("Z"),
            LevelSpec::new("Subcategory").with_default("y"),
        ]).unwrap();
        let state = filter.resolve(&[]);
        assert_eq!(state.levels()[0].default.as_deref(), Some("All"));
        assert_eq!(state.levels()[1].default.as_deref(), Some("y"));

        let plain = CascadingFilter::new(&rows(), vec![LevelSpec::new("Category")]).unwrap();
        assert_eq!(plain.resolve(&[]).levels()[0].default.as_deref(), Some("A"));
    }

    #[test]
    fn invalid_raw_values_fall_back_to_default() {
        let filter = CascadingFilter::new(&rows(), hierarchy()).unwrap();
        let state = filter.resolve(&[sel(&["B"]), sel(&["y"])]);
        assert_eq!(state.selections("Subcategory"), Some(&sel(&["x"])[..]));
    }

    #[test]
    fn empty_level_empties_every_table() {
        let df = df!("Category" => [Some("A"), Some("B")], "Subcategory" => [Some("x"), None]).unwrap();
        let filter = CascadingFilter::new(&df, hierarchy()).unwrap();
        let state = filter.resolve(&[sel(&["B"])]);
        assert!(state.is_empty());
        assert_eq!(state.warnings().len(), 1);
        assert_eq!(filter.apply(&state, &df).unwrap().height(), 0);
    }

    #[test]
    fn absent_columns_are_ignored_when_applying() {
        let filter = CascadingFilter::new(&rows(), hierarchy()).unwrap();
        let state = filter.resolve(&[sel(&["A"]), sel(&["All"])]);
        let related = df!("Category" => ["A", "B", "A"], "Other" => [1, 2, 3]).unwrap();
        assert_eq!(filter.apply(&state, &related).unwrap().height(), 2);
    }

    #[test]
    fn unknown_hierarchy_column() {
        let err = CascadingFilter::new(&rows(), vec![LevelSpec::new("Town")]).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(c) if c == "Town"));
    }
}
