//! Named colour ramps.

use std::fmt;

use crate::error::{Error, Result};

/// RGBA colour with 8-bit channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self { Self { r, g, b, a } }

    const fn from_hex(hex: u32) -> Self {
        Self::new((hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255)
    }

    pub const fn with_alpha(self, a: u8) -> Self { Self { a, ..self } }

    #[inline] pub fn to_array(self) -> [u8; 4] { [self.r, self.g, self.b, self.a] }

    /// CSS hex notation without alpha: #rrggbb
    pub fn to_hex(self) -> String { format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b) }

    fn lerp(self, other: Rgba, t: f64) -> Rgba {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8;
        Rgba::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b), mix(self.a, other.a))
    }
}

impl fmt::Display for Rgba {
    /// Format as CSS: rgba(r,g,b,a) with alpha in [0, 1].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({},{},{},{:.3})", self.r, self.g, self.b, self.a as f64 / 255.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    /// Anchors interpolated linearly.
    Segmented,
    /// Discrete colours, no interpolation.
    Listed,
}

// ColorBrewer 9-class sequential schemes.
const REDS: [u32; 9] = [0xfff5f0, 0xfee0d2, 0xfcbba1, 0xfc9272, 0xfb6a4a, 0xef3b2c, 0xcb181d, 0xa50f15, 0x67000d];
const BLUES: [u32; 9] = [0xf7fbff, 0xdeebf7, 0xc6dbef, 0x9ecae1, 0x6baed6, 0x4292c6, 0x2171b5, 0x08519c, 0x08306b];
const GREENS: [u32; 9] = [0xf7fcf5, 0xe5f5e0, 0xc7e9c0, 0xa1d99b, 0x74c476, 0x41ab5d, 0x238b45, 0x006d2c, 0x00441b];
const ORANGES: [u32; 9] = [0xfff5eb, 0xfee6ce, 0xfdd0a2, 0xfdae6b, 0xfd8d3c, 0xf16913, 0xd94801, 0xa63603, 0x7f2704];
const PURPLES: [u32; 9] = [0xfcfbfd, 0xefedf5, 0xdadaeb, 0xbcbddc, 0x9e9ac8, 0x807dba, 0x6a51a3, 0x54278f, 0x3f007d];
const GREYS: [u32; 9] = [0xffffff, 0xf0f0f0, 0xd9d9d9, 0xbdbdbd, 0x969696, 0x737373, 0x525252, 0x252525, 0x000000];
const YLORRD: [u32; 9] = [0xffffcc, 0xffeda0, 0xfed976, 0xfeb24c, 0xfd8d3c, 0xfc4e2a, 0xe31a1c, 0xbd0026, 0x800026];
const YLORBR: [u32; 9] = [0xffffe5, 0xfff7bc, 0xfee391, 0xfec44f, 0xfe9929, 0xec7014, 0xcc4c02, 0x993404, 0x662506];
const YLGNBU: [u32; 9] = [0xffffd9, 0xedf8b1, 0xc7e9b4, 0x7fcdbb, 0x41b6c4, 0x1d91c0, 0x225ea8, 0x253494, 0x081d58];
const ORRD: [u32; 9] = [0xfff7ec, 0xfee8c8, 0xfdd49e, 0xfdbb84, 0xfc8d59, 0xef6548, 0xd7301f, 0xb30000, 0x7f0000];
const PUBU: [u32; 9] = [0xfff7fb, 0xece7f2, 0xd0d1e6, 0xa6bddb, 0x74a9cf, 0x3690c0, 0x0570b0, 0x045a8d, 0x023858];
const BUGN: [u32; 9] = [0xf7fcfd, 0xe5f5f9, 0xccece6, 0x99d8c9, 0x66c2a4, 0x41ae76, 0x238b45, 0x006d2c, 0x00441b];

// Perceptual ramps, sampled at nine evenly spaced points.
const VIRIDIS: [u32; 9] = [0x440154, 0x472d7b, 0x3b528b, 0x2c728e, 0x21918c, 0x28ae80, 0x5ec962, 0xaddc30, 0xfde725];
const PLASMA: [u32; 9] = [0x0d0887, 0x4c02a1, 0x7e03a8, 0xa92395, 0xcc4778, 0xe56b5d, 0xf89540, 0xfdc527, 0xf0f921];

const TAB20: [u32; 20] = [
    0x1f77b4, 0xaec7e8, 0xff7f0e, 0xffbb78, 0x2ca02c, 0x98df8a, 0xd62728, 0xff9896, 0x9467bd, 0xc5b0d5,
    0x8c564b, 0xc49c94, 0xe377c2, 0xf7b6d2, 0x7f7f7f, 0xc7c7c7, 0xbcbd22, 0xdbdb8d, 0x17becf, 0x9edae5,
];

const CATALOGUE: &[(&str, Kind, &[u32])] = &[
    ("Reds", Kind::Segmented, &REDS),
    ("Blues", Kind::Segmented, &BLUES),
    ("Greens", Kind::Segmented, &GREENS),
    ("Oranges", Kind::Segmented, &ORANGES),
    ("Purples", Kind::Segmented, &PURPLES),
    ("Greys", Kind::Segmented, &GREYS),
    ("YlOrRd", Kind::Segmented, &YLORRD),
    ("YlOrBr", Kind::Segmented, &YLORBR),
    ("YlGnBu", Kind::Segmented, &YLGNBU),
    ("OrRd", Kind::Segmented, &ORRD),
    ("PuBu", Kind::Segmented, &PUBU),
    ("BuGn", Kind::Segmented, &BUGN),
    ("viridis", Kind::Segmented, &VIRIDIS),
    ("plasma", Kind::Segmented, &PLASMA),
    ("tab20", Kind::Listed, &TAB20),
];

/// A colour ramp sampled over [0, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct Colormap {
    name: String,
    kind: Kind,
    colors: Vec<Rgba>,
}

impl Colormap {
    /// Look up a ramp by its case-sensitive name; a `_r` suffix reverses it.
    pub fn named(name: &str) -> Result<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let &(_, kind, hexes) = CATALOGUE.iter()
            .find(|(n, _, _)| *n == base)
            .ok_or_else(|| Error::Config(format!("unknown colormap {name:?}")))?;

        let mut colors: Vec<Rgba> = hexes.iter().map(|&h| Rgba::from_hex(h)).collect();
        if reversed { colors.reverse() }
        Ok(Self { name: name.to_string(), kind, colors })
    }

    /// Every catalogue name.
    pub fn names() -> impl Iterator<Item = &'static str> {
        CATALOGUE.iter().map(|(name, _, _)| *name)
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    /// Opaque colour at `t`, clamped to [0, 1].
    pub fn sample(&self, t: f64) -> Rgba {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let n = self.colors.len();
        match self.kind {
            Kind::Listed => self.colors[((t * n as f64) as usize).min(n - 1)],
            Kind::Segmented => {
                let x = t * (n - 1) as f64;
                let i = (x.floor() as usize).min(n - 2);
                self.colors[i].lerp(self.colors[i + 1], x - i as f64)
            }
        }
    }

    /// `n` samples evenly spaced over [lo, hi].
    pub fn linspace(&self, lo: f64, hi: f64, n: usize) -> Vec<Rgba> {
        match n {
            0 => Vec::new(),
            1 => vec![self.sample(lo)],
            _ => (0..n).map(|i| self.sample(lo + (hi - lo) * i as f64 / (n - 1) as f64)).collect(),
        }
    }
}
