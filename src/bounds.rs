use crate::types::District;
use anyhow::{Context, Result};
use serde::Serialize;
use std::f64::consts::PI;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};

// Spherical Web Mercator (EPSG:3857) radius
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Image overlay placement for one district, in Leaflet's `[lat, lng]` order.
#[derive(Debug, Serialize, PartialEq)]
pub struct DistrictBounds {
    pub name: Option<String>,
    pub gid: String,
    pub bbox: [[f64; 2]; 2],
    pub centroid: [f64; 2],
}

/// Web Mercator metres to WGS84 `(lat, lng)` degrees.
pub fn mercator_to_lat_lng(x: f64, y: f64) -> (f64, f64) {
    let lng = x / EARTH_RADIUS * 180.0 / PI;
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0) * 180.0 / PI;
    (lat, lng)
}

pub fn district_bounds(districts: &[District]) -> Vec<DistrictBounds> {
    districts
        .iter()
        .filter_map(|d| {
            let Some(rect) = d.bounds() else {
                warn!("District {} has no coordinates, skipping", d.id);
                return None;
            };
            let (sw_lat, sw_lng) = mercator_to_lat_lng(rect.min().x, rect.min().y);
            let (ne_lat, ne_lng) = mercator_to_lat_lng(rect.max().x, rect.max().y);
            Some(DistrictBounds {
                name: d.name.clone(),
                gid: d.id.clone(),
                bbox: [[sw_lat, sw_lng], [ne_lat, ne_lng]],
                centroid: [(sw_lat + ne_lat) / 2.0, (sw_lng + ne_lng) / 2.0],
            })
        })
        .collect()
}

pub fn write_bounds(districts: &[District], output: &Path) -> Result<()> {
    let bounds = district_bounds(districts);
    let file = File::create(output).with_context(|| format!("Failed to create {:?}", output))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &bounds)
        .context("Failed to write district bounds")?;
    info!("Saved bounds for {} districts to {:?}", bounds.len(), output);
    Ok(())
}
