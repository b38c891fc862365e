use crate::error::HeatmapError;
use crate::types::{District, SamplePoint};
use anyhow::{anyhow, Context};
use csv::{ReaderBuilder, StringRecord};
use geo::{MultiPolygon, Rect};
use shapefile::dbase::FieldValue;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// Column names as they appear in the sensor exports.
const X_COLUMN: &str = "x";
const Y_COLUMN: &str = "y";
const TEMPERATURE_COLUMN: &str = "temperatur";
const LAND_USE_COLUMN: &str = "ntzg";

struct SampleColumns {
    x: usize,
    y: usize,
    temperature: usize,
    land_use: usize,
}

impl SampleColumns {
    fn from_headers(headers: &StringRecord, path: &Path) -> Result<Self, HeatmapError> {
        let find = |column: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| HeatmapError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                })
        };
        Ok(Self {
            x: find(X_COLUMN)?,
            y: find(Y_COLUMN)?,
            temperature: find(TEMPERATURE_COLUMN)?,
            land_use: find(LAND_USE_COLUMN)?,
        })
    }
}

/// Reads every record of one sample table. Any malformed row fails the file.
pub fn load_samples(path: &Path) -> Result<Vec<SamplePoint>, HeatmapError> {
    load_samples_in(path, None)
}

/// Reads the records of one sample table that lie within `bounds`.
///
/// Coordinates are parsed for every row; the remaining columns only for rows
/// inside `bounds`, so a malformed row only fails the districts it falls in.
pub fn load_samples_in(
    path: &Path,
    bounds: Option<&Rect<f64>>,
) -> Result<Vec<SamplePoint>, HeatmapError> {
    let csv_err = |source| HeatmapError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = ReaderBuilder::new().from_path(path).map_err(csv_err)?;
    let columns = SampleColumns::from_headers(rdr.headers().map_err(csv_err)?, path)?;

    let mut samples = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(csv_err)?;
        let line = record.position().map_or(0, |p| p.line());
        let field = |idx: usize, column: &'static str| {
            let raw = record.get(idx).unwrap_or("").trim();
            raw.parse::<f64>().map_err(|_| HeatmapError::MalformedRow {
                path: path.to_path_buf(),
                line,
                column,
                value: raw.to_string(),
            })
        };

        let x = field(columns.x, X_COLUMN)?;
        let y = field(columns.y, Y_COLUMN)?;
        if let Some(b) = bounds {
            if x < b.min().x || x > b.max().x || y < b.min().y || y > b.max().y {
                continue;
            }
        }

        let temperature = field(columns.temperature, TEMPERATURE_COLUMN)?;
        // integer codes sometimes arrive as "20.0"
        let code = field(columns.land_use, LAND_USE_COLUMN)?;
        if code.fract() != 0.0 {
            return Err(HeatmapError::MalformedRow {
                path: path.to_path_buf(),
                line,
                column: LAND_USE_COLUMN,
                value: code.to_string(),
            });
        }

        samples.push(SamplePoint {
            x,
            y,
            temperature,
            land_use_code: code as i64,
        });
    }
    Ok(samples)
}

/// Lists the `.csv` files of a folder in name order.
pub fn list_sample_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("Input folder does not exist: {:?}", dir));
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read input folder: {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Loads district polygons from a GeoJSON or Shapefile, keyed by `id_field`.
pub fn load_districts(path: &Path, id_field: &str) -> anyhow::Result<Vec<District>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("District file has no extension"))?;

    let districts = match extension.as_str() {
        "shp" => load_shapefile(path, id_field)?,
        "json" | "geojson" => load_geojson(path, id_field)?,
        _ => return Err(anyhow!("Unsupported geometry format: {}", extension)),
    };

    info!("Loaded {} districts from {:?}", districts.len(), path);
    Ok(districts)
}

fn load_shapefile(path: &Path, id_field: &str) -> anyhow::Result<Vec<District>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut districts = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let id_value = record
            .get(id_field)
            .ok_or_else(|| anyhow!("Id field '{}' not found in Shapefile", id_field))?;
        let id = match id_value {
            FieldValue::Character(Some(s)) => s.trim().to_string(),
            FieldValue::Numeric(Some(n)) => format_numeric_id(*n),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Character(None) | FieldValue::Numeric(None) => continue,
            other => return Err(anyhow!("Unsupported id field type: {:?}", other)),
        };
        let name = match record.get("name") {
            Some(FieldValue::Character(Some(s))) => Some(s.trim().to_string()),
            _ => None,
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon of {}: {:?}", id, e))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon of {}: {:?}", id, e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon of {}: {:?}", id, e))?,
            _ => {
                warn!("District {} is not a polygon, skipping", id);
                continue;
            }
        };

        districts.push(District { id, name, geometry });
    }

    Ok(districts)
}

fn load_geojson(path: &Path, id_field: &str) -> anyhow::Result<Vec<District>> {
    let file = File::open(path).with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let geojson = geojson::GeoJson::from_reader(std::io::BufReader::new(file))
        .context("Failed to parse GeoJSON")?;
    parse_districts(geojson, id_field)
}

pub fn parse_districts(geojson: geojson::GeoJson, id_field: &str) -> anyhow::Result<Vec<District>> {
    let collection = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut districts = Vec::new();

    for feature in collection.features {
        let props = feature.properties.as_ref();
        let id = match props.and_then(|p| p.get(id_field)) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => {
                warn!("Feature without '{}' property, skipping", id_field);
                continue;
            }
        };
        let name = props
            .and_then(|p| p.get("name"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let geometry = match feature.geometry {
            Some(geom) => {
                let geom: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry of {}: {:?}", id, e))?;
                match geom {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => {
                        warn!("District {} is not a polygon, skipping", id);
                        continue;
                    }
                }
            }
            None => continue,
        };

        districts.push(District { id, name, geometry });
    }

    Ok(districts)
}

// dBase numeric fields come back as f64; whole numbers keep an integer id.
fn format_numeric_id(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
