//! Legends: labelled swatches for class breaks, an SVG colorbar for
//! continuous norms.

use super::colormap::{Colormap, Rgba};

const BAR_WIDTH: f64 = 400.0;
const BAR_HEIGHT: f64 = 16.0;
const MARGIN: f64 = 12.0;
/// Share of the bar given to the overflow colour, when there is one.
const OVERFLOW_SHARE: f64 = 0.08;
const STOPS: usize = 16;

/// One class of a classed legend.
#[derive(Debug, Clone, PartialEq)]
pub struct Swatch {
    pub color: Rgba,
    pub lower: f64,
    pub upper: f64,
    /// "lo - hi"
    pub label: String,
}

/// A labelled position along the colorbar, in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub position: f64,
    pub label: String,
}

impl Tick {
    pub fn new(position: f64, value: f64) -> Self {
        Self { position: position.clamp(0.0, 1.0), label: format_value(value) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Legend {
    Swatches(Vec<Swatch>),
    Colorbar { svg: String, ticks: Vec<Tick> },
}

/// Whole numbers print without decimals, everything else with two.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 { format!("{value:.0}") } else { format!("{value:.2}") }
}

/// One swatch per class; `breaks` has one more entry than `colors`.
pub(crate) fn swatches(breaks: &[f64], colors: &[Rgba]) -> Vec<Swatch> {
    breaks.windows(2).zip(colors)
        .map(|(pair, &color)| Swatch {
            color,
            lower: pair[0],
            upper: pair[1],
            label: format!("{} - {}", format_value(pair[0]), format_value(pair[1])),
        })
        .collect()
}

/// Horizontal gradient over the ramp. `overflow` adds a solid block at the
/// right end for values beyond the norm (e.g. outliers).
pub(crate) fn colorbar(colormap: &Colormap, alpha: u8, ticks: Vec<Tick>, overflow: Option<(Rgba, &str)>) -> Legend {
    let ramp_width = match overflow {
        Some(_) => BAR_WIDTH * (1.0 - OVERFLOW_SHARE),
        None => BAR_WIDTH,
    };
    let width = BAR_WIDTH + 2.0 * MARGIN;
    let height = BAR_HEIGHT + 36.0;
    let opacity = alpha as f64 / 255.0;

    let mut svg = String::new();
    svg.push_str(&format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"##
    ));
    svg.push('\n');
    svg.push_str(r#"<defs><linearGradient id="ramp" x1="0" x2="1" y1="0" y2="0">"#);
    for i in 0..=STOPS {
        let t = i as f64 / STOPS as f64;
        svg.push_str(&format!(
            r#"<stop offset="{:.4}" stop-color="{}" stop-opacity="{opacity:.3}"/>"#,
            t, colormap.sample(t).to_hex(),
        ));
    }
    svg.push_str("</linearGradient></defs>\n");
    svg.push_str(&format!(
        r#"<rect x="{MARGIN}" y="4" width="{ramp_width}" height="{BAR_HEIGHT}" fill="url(#ramp)"/>"#
    ));
    svg.push('\n');

    if let Some((color, label)) = overflow {
        let x = MARGIN + ramp_width;
        let block = BAR_WIDTH - ramp_width;
        svg.push_str(&format!(
            r#"<rect x="{x}" y="4" width="{block}" height="{BAR_HEIGHT}" fill="{}" fill-opacity="{:.3}"/>"#,
            color.to_hex(), color.a as f64 / 255.0,
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-size="10" text-anchor="middle">{}</text>"#,
            x + block / 2.0, BAR_HEIGHT + 30.0, escape(label),
        ));
        svg.push('\n');
    }

    for tick in &ticks {
        let x = MARGIN + tick.position * ramp_width;
        svg.push_str(&format!(
            r##"<line x1="{x:.2}" x2="{x:.2}" y1="4" y2="{}" stroke="#111827" stroke-width="1"/>"##,
            BAR_HEIGHT + 8.0,
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{}" font-size="10" text-anchor="middle">{}</text>"#,
            BAR_HEIGHT + 20.0, escape(&tick.label),
        ));
        svg.push('\n');
    }
    svg.push_str("</svg>\n");

    Legend::Colorbar { svg, ticks }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
