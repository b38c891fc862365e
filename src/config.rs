use crate::colormap::ColormapConfig;
use crate::render::Orientation;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Folder of sample tables, one `.csv` per input file.
    pub csv_dir: PathBuf,
    /// District polygons (GeoJSON or Shapefile) in the samples' CRS.
    pub districts: PathBuf,
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    /// Pixel count of the longer image side.
    pub resolution: u32,
    pub colormap: ColormapConfig,
    pub value_min: f32,
    pub value_max: f32,
    pub orientation: Orientation,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            resolution: 5120,
            colormap: ColormapConfig::default(),
            value_min: 10.0,
            value_max: 36.0,
            orientation: Orientation::SouthUp,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(default = "default_world_file")]
    pub world_file: bool,
}

fn default_id_field() -> String {
    "gid".to_string()
}

fn default_world_file() -> bool {
    true
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.render.resolution == 0 {
            return Err(anyhow!("render.resolution must be positive"));
        }
        if !(self.render.value_max > self.render.value_min) {
            return Err(anyhow!(
                "render.value_max ({}) must exceed render.value_min ({})",
                self.render.value_max,
                self.render.value_min
            ));
        }
        if self.batch.workers == 0 {
            return Err(anyhow!("batch.workers must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [input]
            csv_dir = "csvdata/epsg3857"
            districts = "geodata/bezirke.geojson"

            [output]
            dir = "heatmaps"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.input.id_field, "gid");
        assert_eq!(config.render.resolution, 5120);
        assert_eq!(config.render.colormap, ColormapConfig::Named("RdBu_r".into()));
        assert_eq!(config.render.orientation, Orientation::SouthUp);
        assert_eq!(config.batch.workers, 4);
        assert!(config.output.world_file);
    }

    #[test]
    fn custom_stops_and_orientation() {
        let config: AppConfig = toml::from_str(
            r##"
            [input]
            csv_dir = "in"
            districts = "d.shp"
            id_field = "bezirk"

            [render]
            resolution = 1024
            colormap = ["#2166ac", "#f7f7f7", "#b2182b"]
            value_min = 15.0
            value_max = 30.0
            orientation = "north_up"

            [batch]
            workers = 2

            [output]
            dir = "out"
            world_file = false
            "##,
        )
        .unwrap();
        assert_eq!(config.render.orientation, Orientation::NorthUp);
        assert!(matches!(config.render.colormap, ColormapConfig::Stops(ref s) if s.len() == 3));
        assert_eq!(config.batch.workers, 2);
        assert!(!config.output.world_file);
    }

    #[test]
    fn inverted_value_range_is_rejected() {
        let mut config: AppConfig = toml::from_str(
            "[input]\ncsv_dir = \"in\"\ndistricts = \"d.geojson\"\n[output]\ndir = \"out\"\n",
        )
        .unwrap();
        config.render.value_min = 40.0;
        assert!(config.validate().is_err());
    }
}
