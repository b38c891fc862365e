use image::Rgba;
use serde::Deserialize;

const LUT_SIZE: usize = 256;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ColorBrewer 11-class diverging schemes, low to high.
const RD_BU: [&str; 11] = [
    "#67001f", "#b2182b", "#d6604d", "#f4a582", "#fddbc7", "#f7f7f7",
    "#d1e5f0", "#92c5de", "#4393c3", "#2166ac", "#053061",
];
const RD_YL_BU: [&str; 11] = [
    "#a50026", "#d73027", "#f46d43", "#fdae61", "#fee090", "#ffffbf",
    "#e0f3f8", "#abd9e9", "#74add1", "#4575b4", "#313695",
];
const SPECTRAL: [&str; 11] = [
    "#9e0142", "#d53e4f", "#f46d43", "#fdae61", "#fee08b", "#ffffbf",
    "#e6f598", "#abdda4", "#66c2a5", "#3288bd", "#5e4fa2",
];

/// Colour map selection from the `[render]` config section.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ColormapConfig {
    /// Built-in scale, e.g. `"RdBu_r"`; a `_r` suffix reverses it.
    Named(String),
    /// Hex stops, low to high, spaced evenly.
    Stops(Vec<String>),
}

impl Default for ColormapConfig {
    fn default() -> Self {
        ColormapConfig::Named("RdBu_r".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Colormap {
    lut: Vec<Rgba<u8>>,
}

impl Colormap {
    pub fn from_config(config: &ColormapConfig) -> Option<Self> {
        match config {
            ColormapConfig::Named(name) => Self::named(name),
            ColormapConfig::Stops(stops) => {
                let stops: Option<Vec<[f64; 3]>> = stops.iter().map(|s| hex_to_rgb(s)).collect();
                Self::from_stops(&stops?)
            }
        }
    }

    pub fn named(name: &str) -> Option<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let hexes: &[&str] = match base {
            "RdBu" => &RD_BU,
            "RdYlBu" => &RD_YL_BU,
            "Spectral" => &SPECTRAL,
            "gray" | "grey" => &["#000000", "#ffffff"],
            _ => return None,
        };
        let mut stops: Vec<[f64; 3]> = hexes.iter().filter_map(|h| hex_to_rgb(h)).collect();
        if reversed {
            stops.reverse();
        }
        Self::from_stops(&stops)
    }

    fn from_stops(stops: &[[f64; 3]]) -> Option<Self> {
        if stops.len() < 2 {
            return None;
        }
        let segments = (stops.len() - 1) as f64;
        let lut = (0..LUT_SIZE)
            .map(|i| {
                let pos = i as f64 / (LUT_SIZE - 1) as f64 * segments;
                let lo = (pos.floor() as usize).min(stops.len() - 2);
                let frac = pos - lo as f64;
                let channel = |c: usize| {
                    let v = stops[lo][c] + (stops[lo + 1][c] - stops[lo][c]) * frac;
                    (v * 255.0).round().clamp(0.0, 255.0) as u8
                };
                Rgba([channel(0), channel(1), channel(2), 255])
            })
            .collect();
        Some(Self { lut })
    }

    /// Colour for `value` on a scale spanning `[value_min - 1, value_max]`.
    ///
    /// The scale has one extra bucket below the colour map proper, rendered
    /// black, and everything under the scale is black too. Above the scale
    /// the top colour is used; NaN is transparent.
    pub fn color_for(&self, value: f32, value_min: f32, value_max: f32) -> Rgba<u8> {
        if value.is_nan() {
            return TRANSPARENT;
        }
        let low = value_min as f64 - 1.0;
        let span = value_max as f64 - low;
        let t = (value as f64 - low) / span;
        if t < 0.0 {
            return BLACK;
        }
        let buckets = LUT_SIZE + 1;
        let index = ((t * buckets as f64).floor() as usize).min(buckets - 1);
        match index {
            0 => BLACK,
            i => self.lut[i - 1],
        }
    }

    pub fn lut(&self) -> &[Rgba<u8>] {
        &self.lut
    }
}

fn hex_to_rgb(hex: &str) -> Option<[f64; 3]> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(hex.get(range)?, 16)
            .ok()
            .map(|v| v as f64 / 255.0)
    };
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}
