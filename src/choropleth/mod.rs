//! Per-feature fill colours for a numeric attribute of a geospatial table.
mod colormap;
pub mod jenks;
mod legend;

pub use colormap::{Colormap, Rgba};
pub use legend::{format_value, Legend, Swatch, Tick};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result, Warning},
    table::{column, numeric_values, GeoTable},
};

/// Fixed fill alpha.
pub const ALPHA: u8 = 180;
/// Colour of features with a missing value.
pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
/// Colour of outliers under [`Strategy::OutlierYellow`].
pub const OUTLIER_YELLOW: Rgba = Rgba::new(255, 255, 0, ALPHA);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Jenks natural breaks with one swatch per class.
    #[default]
    Jenks,
    /// Continuous ramp that reserves the top of the ramp for outliers.
    OutlierHoldout,
    /// Continuous ramp up to the cutoff; outliers are yellow.
    OutlierYellow,
}

impl std::str::FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "jenks" => Ok(Self::Jenks),
            "outlier_holdout" | "holdout" => Ok(Self::OutlierHoldout),
            "outlier_yellow" | "yellow" => Ok(Self::OutlierYellow),
            other => Err(Error::Config(format!("unknown colouring strategy {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoroplethConfig {
    pub strategy: Strategy,
    pub classes: usize,
    pub colormap: String,
    /// Cutoff is mean + k·stddev.
    pub outlier_k: f64,
    /// Share of the ramp held back for values above the cutoff.
    pub outlier_fraction: f64,
}

impl Default for ChoroplethConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Jenks,
            classes: 10,
            colormap: "Reds".to_string(),
            outlier_k: 5.0,
            outlier_fraction: 0.05,
        }
    }
}

/// Maps values to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Norm {
    /// [vmin, vmax] → [0, 1].
    Linear { vmin: f64, vmax: f64 },
    /// [vmin, cutoff] → [0, 1 − fraction], (cutoff, vmax] → (1 − fraction, 1].
    Holdout { vmin: f64, cutoff: f64, vmax: f64, fraction: f64 },
}

impl Norm {
    pub fn apply(&self, value: f64) -> f64 {
        let scale = |v: f64, lo: f64, hi: f64| if hi > lo { (v - lo) / (hi - lo) } else { 0.0 };
        let t = match *self {
            Norm::Linear { vmin, vmax } => scale(value, vmin, vmax),
            Norm::Holdout { vmin, cutoff, vmax, fraction } => {
                if value <= cutoff {
                    scale(value, vmin, cutoff) * (1.0 - fraction)
                } else {
                    (1.0 - fraction) + scale(value, cutoff, vmax) * fraction
                }
            }
        };
        t.clamp(0.0, 1.0)
    }
}

/// How values were turned into colours.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Deduplicated class boundaries; class `i` covers `(breaks[i], breaks[i+1]]`
    /// and the first class also includes `breaks[0]`.
    Breaks(Vec<f64>),
    Continuous { norm: Norm, cutoff: Option<f64> },
}

/// Colours aligned with the table rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Colouring {
    pub colors: Vec<Rgba>,
    pub classification: Option<Classification>,
    pub legend: Option<Legend>,
    pub warning: Option<Warning>,
}

impl Colouring {
    /// All-transparent colouring for `rows` features.
    pub fn empty(rows: usize, warning: Option<Warning>) -> Self {
        Self { colors: vec![TRANSPARENT; rows], classification: None, legend: None, warning }
    }
}

impl ChoroplethConfig {
    /// Colour `values` (one per feature). Errors with `InvalidMeasure` when no
    /// value is present.
    pub fn classify(&self, name: &str, values: &[Option<f64>]) -> Result<Colouring> {
        let colormap = Colormap::named(&self.colormap)?;
        let present: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
        if present.is_empty() {
            return Err(Error::InvalidMeasure(name.to_string()));
        }

        let colouring = match self.strategy {
            Strategy::Jenks => self.jenks(values, &present, &colormap),
            Strategy::OutlierHoldout => {
                let (vmin, vmax, cutoff) = self.bounds(&present);
                let norm = Norm::Holdout { vmin, cutoff, vmax, fraction: self.outlier_fraction };
                let mut ticks = vec![Tick::new(0.0, vmin), Tick::new(norm.apply(cutoff.min(vmax)), cutoff.min(vmax))];
                if vmax > cutoff {
                    ticks.push(Tick::new(1.0, vmax));
                }
                let colors = paint(values, |v| colormap.sample(norm.apply(v)).with_alpha(ALPHA));
                Colouring {
                    colors,
                    classification: Some(Classification::Continuous { norm, cutoff: Some(cutoff) }),
                    legend: Some(legend::colorbar(&colormap, ALPHA, ticks, None)),
                    warning: None,
                }
            }
            Strategy::OutlierYellow => {
                let (vmin, vmax, cutoff) = self.bounds(&present);
                let norm = Norm::Linear { vmin, vmax: cutoff };
                let colors = paint(values, |v| {
                    if v > cutoff { OUTLIER_YELLOW } else { colormap.sample(norm.apply(v)).with_alpha(ALPHA) }
                });
                let overflow_label = format!("> {}", format_value(cutoff));
                let overflow = (vmax > cutoff).then_some((OUTLIER_YELLOW, overflow_label.as_str()));
                let ticks = vec![Tick::new(0.0, vmin), Tick::new(1.0, cutoff)];
                Colouring {
                    colors,
                    classification: Some(Classification::Continuous { norm, cutoff: Some(cutoff) }),
                    legend: Some(legend::colorbar(&colormap, ALPHA, ticks, overflow)),
                    warning: None,
                }
            }
        };
        log::debug!("[choropleth] coloured {} features of {name} with {:?}/{}", values.len(), self.strategy, self.colormap);
        Ok(colouring)
    }

    fn jenks(&self, values: &[Option<f64>], present: &[f64], colormap: &Colormap) -> Colouring {
        let breaks = jenks::natural_breaks(present, self.classes);
        let palette: Vec<Rgba> = colormap.linspace(0.1, 0.9, breaks.len() - 1)
            .into_iter()
            .map(|c| c.with_alpha(ALPHA))
            .collect();
        let colors = paint(values, |v| palette[jenks::bin(&breaks, v)]);
        Colouring {
            colors,
            legend: Some(Legend::Swatches(legend::swatches(&breaks, &palette))),
            classification: Some(Classification::Breaks(breaks)),
            warning: None,
        }
    }

    /// (min, max, mean + k·stddev) using the sample standard deviation.
    fn bounds(&self, present: &[f64]) -> (f64, f64, f64) {
        let n = present.len() as f64;
        let vmin = present.iter().copied().fold(f64::INFINITY, f64::min);
        let vmax = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = present.iter().sum::<f64>() / n;
        let std = if present.len() > 1 {
            (present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        (vmin, vmax, mean + self.outlier_k * std)
    }

    /// Colour the `column` attribute of a geospatial table.
    pub fn color_column(&self, table: &GeoTable, column_name: &str) -> Result<Colouring> {
        let values = numeric_values(column(table.data(), column_name)?)?;
        self.classify(column_name, &values)
    }

    /// Like [`color_column`](Self::color_column), but an attribute with no
    /// values degrades to an all-transparent colouring with a warning.
    pub fn colorize(&self, table: &GeoTable, column_name: &str) -> Result<Colouring> {
        match self.color_column(table, column_name) {
            Err(err @ Error::InvalidMeasure(_)) => {
                let warning = Warning::new("choropleth", format!("{err}; no colours applied"));
                Ok(Colouring::empty(table.height(), Some(warning)))
            }
            other => other,
        }
    }
}

fn paint(values: &[Option<f64>], color: impl Fn(f64) -> Rgba) -> Vec<Rgba> {
    values.iter()
        .map(|v| match v {
            Some(v) if v.is_finite() => color(*v),
            _ => TRANSPARENT,
        })
        .collect()
}
