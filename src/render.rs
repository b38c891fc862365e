use crate::colormap::{Colormap, BLACK, TRANSPARENT};
use crate::error::Result;
use crate::grid::{GeoTransform, Grid};
use image::{ImageBuffer, Rgba, RgbaImage};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Value written to the PNG `Software` text chunk.
pub const SOFTWARE: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellState {
    NoData,
    Building,
    Value(f32),
}

/// Which grid row lands in the first image row.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Image row 0 is the southernmost grid row.
    #[default]
    SouthUp,
    NorthUp,
}

pub struct CompositeImage {
    pub image: RgbaImage,
    pub transform: GeoTransform,
    pub orientation: Orientation,
}

impl CompositeImage {
    /// Image pixel holding grid cell `(row, col)`.
    pub fn pixel_for_cell(&self, row: usize, col: usize) -> &Rgba<u8> {
        let y = match self.orientation {
            Orientation::SouthUp => row,
            Orientation::NorthUp => self.image.height() as usize - 1 - row,
        };
        self.image.get_pixel(col as u32, y as u32)
    }

    /// Writes the PNG, plus an ESRI world file when `world_file` is set.
    pub fn save(&self, path: &Path, world_file: bool) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        let mut encoder = png::Encoder::new(writer, self.image.width(), self.image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.add_text_chunk("Software".to_string(), SOFTWARE.to_string())?;
        let mut writer = encoder.write_header()?;
        writer.write_image_data(self.image.as_raw())?;
        writer.finish()?;

        if world_file {
            self.save_world_file(&world_file_path(path))?;
        }
        debug!("wrote {:?} ({}x{})", path, self.image.width(), self.image.height());
        Ok(())
    }

    // Six lines: pixel size in x, two rotation terms, pixel size in y, then
    // the map coordinates of the centre of pixel (0,0).
    fn save_world_file(&self, path: &Path) -> Result<()> {
        let t = &self.transform;
        let rows = self.image.height() as f64;
        let (dy, first_y) = match self.orientation {
            Orientation::SouthUp => (t.cell_height, t.origin_y + 0.5 * t.cell_height),
            Orientation::NorthUp => (-t.cell_height, t.origin_y + (rows - 0.5) * t.cell_height),
        };
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{}", t.cell_width)?;
        writeln!(out, "0")?;
        writeln!(out, "0")?;
        writeln!(out, "{dy}")?;
        writeln!(out, "{}", t.origin_x + 0.5 * t.cell_width)?;
        writeln!(out, "{first_y}")?;
        out.flush()?;
        Ok(())
    }
}

pub fn world_file_path(png: &Path) -> PathBuf {
    png.with_extension("pgw")
}

/// Classifies every cell. Later rules win: outside the district is no data,
/// buildings inside the district override the temperature.
pub fn classify_cells(
    temperature: &Grid<f32>,
    buildings: &Grid<bool>,
    mask: &Grid<bool>,
) -> Result<Grid<CellState>> {
    temperature.ensure_aligned(buildings, "buildings")?;
    temperature.ensure_aligned(mask, "mask")?;

    let mut cells = temperature.map(|t| {
        if t.is_nan() {
            CellState::NoData
        } else {
            CellState::Value(t)
        }
    });
    for row in 0..cells.height() {
        for col in 0..cells.width() {
            if !mask.get(row, col) {
                cells.set(row, col, CellState::NoData);
            } else if buildings.get(row, col) {
                cells.set(row, col, CellState::Building);
            }
        }
    }
    Ok(cells)
}

pub fn cell_color(state: CellState, colormap: &Colormap, value_min: f32, value_max: f32) -> Rgba<u8> {
    match state {
        CellState::NoData => TRANSPARENT,
        CellState::Building => BLACK,
        CellState::Value(v) => colormap.color_for(v, value_min, value_max),
    }
}

/// Merges the three aligned grids into one colour-mapped RGBA image.
pub fn compose(
    temperature: &Grid<f32>,
    buildings: &Grid<bool>,
    mask: &Grid<bool>,
    colormap: &Colormap,
    value_min: f32,
    value_max: f32,
    orientation: Orientation,
) -> Result<CompositeImage> {
    let cells = classify_cells(temperature, buildings, mask)?;
    let (width, height) = (cells.width() as u32, cells.height() as u32);

    let image: RgbaImage = ImageBuffer::from_fn(width, height, |x, y| {
        let row = match orientation {
            Orientation::SouthUp => y,
            Orientation::NorthUp => height - 1 - y,
        };
        cell_color(cells.get(row as usize, x as usize), colormap, value_min, value_max)
    });

    Ok(CompositeImage {
        image,
        transform: *cells.transform(),
        orientation,
    })
}
