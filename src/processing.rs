use crate::colormap::Colormap;
use crate::config::AppConfig;
use crate::data::load_samples_in;
use crate::error::{HeatmapError, Result};
use crate::grid::{grid_dimensions, GeoTransform, Grid};
use crate::interpolate::{interpolate, Method};
use crate::masking::rasterize;
use crate::render::{compose, CompositeImage, Orientation};
use crate::types::{District, SamplePoint};
use geo::{Contains, MultiPolygon, Point, Rect};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Read-only parameters shared by every task of a batch.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub resolution: u32,
    pub colormap: Colormap,
    pub value_min: f32,
    pub value_max: f32,
    pub orientation: Orientation,
    pub world_file: bool,
    pub output_dir: PathBuf,
}

impl RenderSettings {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let colormap = Colormap::from_config(&config.render.colormap)
            .ok_or_else(|| anyhow::anyhow!("Unknown colormap: {:?}", config.render.colormap))?;
        Ok(Self {
            resolution: config.render.resolution,
            colormap,
            value_min: config.render.value_min,
            value_max: config.render.value_max,
            orientation: config.render.orientation,
            world_file: config.output.world_file,
            output_dir: config.output.dir.clone(),
        })
    }
}

/// `{csv stem}_district{id}.png`
pub fn output_file_name(input: &Path, district_id: &str) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!("{stem}_district{district_id}.png")
}

/// Samples strictly inside the district; points on the boundary are dropped.
pub fn samples_within(
    samples: &[SamplePoint],
    geometry: &MultiPolygon<f64>,
    bounds: &Rect<f64>,
) -> Vec<SamplePoint> {
    let (min, max) = (bounds.min(), bounds.max());
    samples
        .iter()
        .filter(|s| s.x >= min.x && s.x <= max.x && s.y >= min.y && s.y <= max.y)
        .filter(|s| geometry.contains(&Point::new(s.x, s.y)))
        .copied()
        .collect()
}

fn classify_buildings(
    samples: &[SamplePoint],
    transform: &GeoTransform,
    width: usize,
    height: usize,
) -> Grid<bool> {
    let points: Vec<[f64; 2]> = samples.iter().map(|s| [s.x, s.y]).collect();
    let flags: Vec<f32> = samples
        .iter()
        .map(|s| if s.is_building() { 1.0 } else { 0.0 })
        .collect();

    match interpolate(&points, &flags, transform, width, height, Method::Nearest, 0.0) {
        Ok(grid) => grid.map(|v| v > 0.5),
        Err(e) => {
            warn!("building classification unavailable: {e}");
            Grid::filled(width, height, *transform, false)
        }
    }
}

fn interpolate_temperature(
    samples: &[SamplePoint],
    transform: &GeoTransform,
    width: usize,
    height: usize,
) -> Result<Grid<f32>> {
    let (points, temps): (Vec<[f64; 2]>, Vec<f32>) = samples
        .iter()
        .filter(|s| !s.is_building())
        .map(|s| ([s.x, s.y], s.temperature as f32))
        .unzip();

    match interpolate(&points, &temps, transform, width, height, Method::Linear, f32::NAN) {
        Err(e @ HeatmapError::InterpolationInput { .. }) => {
            warn!("{e}; temperature left as no data");
            Ok(Grid::filled(width, height, *transform, f32::NAN))
        }
        other => other,
    }
}

/// Runs mask, both interpolation passes and compositing for one district.
///
/// Returns `EmptyIntersection` when no sample lies inside the district and
/// `Geometry` when the district cannot be rasterized; both are skips.
pub fn render_heatmap(
    samples: &[SamplePoint],
    district: &District,
    settings: &RenderSettings,
) -> Result<CompositeImage> {
    let bounds = district.bounds().ok_or_else(|| {
        HeatmapError::Geometry(format!("district {} has no coordinates", district.id))
    })?;

    let inside = samples_within(samples, &district.geometry, &bounds);
    if inside.is_empty() {
        return Err(HeatmapError::EmptyIntersection {
            district: district.id.clone(),
        });
    }

    let (width, height) = grid_dimensions(&bounds, settings.resolution)?;
    info!(
        district = %district.id,
        samples = inside.len(),
        "Creating grid with dimensions: {}x{} pixels",
        width,
        height
    );
    let transform = GeoTransform::from_bounds(&bounds, width, height);

    let mask = rasterize(&district.geometry, width, height, &bounds);
    if mask.count_true() == 0 {
        return Err(HeatmapError::Geometry(format!(
            "district {} covers no grid cells",
            district.id
        )));
    }

    let buildings = classify_buildings(&inside, &transform, width, height);
    let temperature = interpolate_temperature(&inside, &transform, width, height)?;

    compose(
        &temperature,
        &buildings,
        &mask,
        &settings.colormap,
        settings.value_min,
        settings.value_max,
        settings.orientation,
    )
}

/// Full pipeline for one (file, district) pair: load, render, write.
pub fn process_task(file: &Path, district: &District, settings: &RenderSettings) -> Result<PathBuf> {
    // rows outside this district's box are never parsed
    let samples = load_samples_in(file, district.bounds().as_ref())?;
    let image = render_heatmap(&samples, district, settings)?;

    let path = settings
        .output_dir
        .join(output_file_name(file, &district.id));
    image.save(&path, settings.world_file)?;
    info!(
        file = %file.display(),
        district = %district.id,
        "Successfully created heatmap {:?}",
        path
    );
    Ok(path)
}
