//! Regular grids and the affine mapping between cells and map coordinates.
//!
//! Row 0 is the southernmost row: `origin_y` is the minimum northing and
//! rows grow northwards.

use crate::error::{HeatmapError, Result};
use geo::Rect;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl GeoTransform {
    pub fn from_bounds(bounds: &Rect<f64>, width: usize, height: usize) -> Self {
        Self {
            origin_x: bounds.min().x,
            origin_y: bounds.min().y,
            cell_width: bounds.width() / width as f64,
            cell_height: bounds.height() / height as f64,
        }
    }

    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.cell_width,
            self.origin_y + (row as f64 + 0.5) * self.cell_height,
        )
    }

    /// Map-space rectangle covered by a cell.
    pub fn cell_rect(&self, row: usize, col: usize) -> Rect<f64> {
        let x0 = self.origin_x + col as f64 * self.cell_width;
        let y0 = self.origin_y + row as f64 * self.cell_height;
        Rect::new(
            (x0, y0),
            (x0 + self.cell_width, y0 + self.cell_height),
        )
    }

    /// Fractional column of a map x coordinate.
    pub fn col_f(&self, x: f64) -> f64 {
        (x - self.origin_x) / self.cell_width
    }

    /// Fractional row of a map y coordinate.
    pub fn row_f(&self, y: f64) -> f64 {
        (y - self.origin_y) / self.cell_height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    transform: GeoTransform,
    cells: Vec<T>,
}

impl<T: Copy> Grid<T> {
    pub fn filled(width: usize, height: usize, transform: GeoTransform, value: T) -> Self {
        Self {
            width,
            height,
            transform,
            cells: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.cells[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.cells[row * self.width + col] = value;
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        let start = row * self.width;
        &mut self.cells[start..start + self.width]
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            transform: self.transform,
            cells: self.cells.iter().map(|&c| f(c)).collect(),
        }
    }

    /// Fails unless `other` has the same shape and transform.
    pub fn ensure_aligned<U>(&self, other: &Grid<U>, name: &'static str) -> Result<()> {
        if self.width != other.width
            || self.height != other.height
            || self.transform != other.transform
        {
            return Err(HeatmapError::GridMismatch {
                name,
                width: self.width,
                height: self.height,
                got_width: other.width,
                got_height: other.height,
            });
        }
        Ok(())
    }
}

impl Grid<bool> {
    pub fn count_true(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// Pixel dimensions `(width, height)` for a district's bounds.
///
/// The longer side gets `resolution` pixels and the shorter side is scaled by
/// the aspect ratio, so narrow districts never exceed the configured size.
pub fn grid_dimensions(bounds: &Rect<f64>, resolution: u32) -> Result<(usize, usize)> {
    let width_extent = bounds.width();
    let height_extent = bounds.height();
    if !(width_extent > 0.0 && height_extent > 0.0) {
        return Err(HeatmapError::Geometry(format!(
            "bounding box has zero area ({width_extent} x {height_extent})"
        )));
    }
    if resolution == 0 {
        return Err(HeatmapError::Setup("resolution must be positive".into()));
    }

    let res = resolution as f64;
    let ratio = height_extent / width_extent;
    let (width, height) = if ratio > 1.0 {
        ((res / ratio).round(), res)
    } else {
        (res, (res * ratio).round())
    };
    Ok((width.max(1.0) as usize, height.max(1.0) as usize))
}
