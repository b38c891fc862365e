//! Scattered-sample interpolation onto regular grids.
//!
//! Targets are cell centres of the supplied [`GeoTransform`]. Both methods
//! leave cells outside the samples' convex hull at the fill value.

use crate::error::{HeatmapError, Result};
use crate::grid::{GeoTransform, Grid};
use geo::{ConvexHull, Coord, LinesIter, MultiPoint, Point};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};
use std::fmt;

const HULL_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Value of the closest sample; keeps categorical data crisp.
    Nearest,
    /// Barycentric interpolation over the Delaunay triangulation.
    Linear,
}

impl Method {
    fn name(self) -> &'static str {
        match self {
            Method::Nearest => "nearest",
            Method::Linear => "linear",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Interpolates `values` at `points` onto a `width` x `height` grid.
pub fn interpolate(
    points: &[[f64; 2]],
    values: &[f32],
    transform: &GeoTransform,
    width: usize,
    height: usize,
    method: Method,
    fill_value: f32,
) -> Result<Grid<f32>> {
    debug_assert_eq!(points.len(), values.len());
    let mut grid = Grid::filled(width, height, *transform, fill_value);
    match method {
        Method::Nearest => fill_nearest(&mut grid, points, values)?,
        Method::Linear => fill_linear(&mut grid, points, values)?,
    }
    Ok(grid)
}

fn fill_nearest(grid: &mut Grid<f32>, points: &[[f64; 2]], values: &[f32]) -> Result<()> {
    if points.is_empty() {
        return Err(HeatmapError::InterpolationInput {
            method: Method::Nearest.name(),
            required: 1,
            available: 0,
        });
    }

    let tree = RTree::bulk_load(
        points
            .iter()
            .zip(values)
            .map(|(&p, &v)| GeomWithData::new(p, v))
            .collect(),
    );
    let hull = HullSpans::new(points);
    let t = *grid.transform();

    for row in 0..grid.height() {
        let (_, y) = t.cell_center(row, 0);
        let Some((x_lo, x_hi)) = hull.span_at(y) else {
            continue;
        };
        for (col, cell) in grid.row_mut(row).iter_mut().enumerate() {
            let (x, _) = t.cell_center(row, col);
            if x < x_lo || x > x_hi {
                continue;
            }
            if let Some(nearest) = tree.nearest_neighbor(&[x, y]) {
                *cell = nearest.data;
            }
        }
    }
    Ok(())
}

/// Horizontal extent of a convex hull, one interval per scanline.
struct HullSpans {
    edges: Vec<(Coord<f64>, Coord<f64>)>,
    tolerance: f64,
}

impl HullSpans {
    fn new(points: &[[f64; 2]]) -> Self {
        let multi: MultiPoint<f64> = points.iter().map(|&[x, y]| Point::new(x, y)).collect();
        let hull = multi.convex_hull();
        let mut edges: Vec<(Coord<f64>, Coord<f64>)> =
            hull.lines_iter().map(|l| (l.start, l.end)).collect();
        if edges.is_empty() {
            // single distinct sample
            if let Some(c) = hull.exterior().0.first() {
                edges.push((*c, *c));
            }
        }
        let scale = edges
            .iter()
            .flat_map(|(a, b)| [a.x.abs(), a.y.abs(), b.x.abs(), b.y.abs()])
            .fold(1.0, f64::max);
        Self {
            edges,
            tolerance: HULL_EPSILON * scale,
        }
    }

    fn span_at(&self, y: f64) -> Option<(f64, f64)> {
        let mut span: Option<(f64, f64)> = None;
        let mut widen = |x: f64| {
            span = Some(match span {
                Some((lo, hi)) => (lo.min(x), hi.max(x)),
                None => (x, x),
            });
        };
        for &(a, b) in &self.edges {
            let (lo, hi) = (a.y.min(b.y), a.y.max(b.y));
            if y < lo - self.tolerance || y > hi + self.tolerance {
                continue;
            }
            if (b.y - a.y).abs() <= self.tolerance {
                widen(a.x);
                widen(b.x);
            } else {
                let y = y.clamp(lo, hi);
                widen(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        span.map(|(lo, hi)| (lo - self.tolerance, hi + self.tolerance))
    }
}

struct Sample {
    position: Point2<f64>,
    value: f32,
}

impl HasPosition for Sample {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

fn fill_linear(grid: &mut Grid<f32>, points: &[[f64; 2]], values: &[f32]) -> Result<()> {
    let mut triangulation: DelaunayTriangulation<Sample> = DelaunayTriangulation::new();
    for (&[x, y], &value) in points.iter().zip(values) {
        triangulation
            .insert(Sample {
                position: Point2::new(x, y),
                value,
            })
            .map_err(|_| HeatmapError::InvalidSample { x, y })?;
    }

    if triangulation.num_inner_faces() == 0 {
        return Err(HeatmapError::InterpolationInput {
            method: Method::Linear.name(),
            required: 3,
            available: triangulation.num_vertices(),
        });
    }

    for face in triangulation.inner_faces() {
        let corners = face.vertices().map(|v| {
            let p = v.position();
            (p.x, p.y, v.data().value)
        });
        fill_triangle(grid, corners);
    }
    Ok(())
}

// Writes every cell whose centre lies inside the triangle.
fn fill_triangle(grid: &mut Grid<f32>, [a, b, c]: [(f64, f64, f32); 3]) {
    let det = (b.1 - c.1) * (a.0 - c.0) + (c.0 - b.0) * (a.1 - c.1);
    if det == 0.0 {
        return;
    }

    let t = *grid.transform();
    let (min_x, max_x) = (a.0.min(b.0).min(c.0), a.0.max(b.0).max(c.0));
    let (min_y, max_y) = (a.1.min(b.1).min(c.1), a.1.max(b.1).max(c.1));

    // centres in [min, max]: index i with i + 0.5 in [f(min), f(max)]
    let first = |v: f64| (v - 0.5).ceil().max(0.0) as usize;
    let last = |v: f64, n: usize| ((v - 0.5).floor()).min(n as f64 - 1.0);

    let last_row = last(t.row_f(max_y), grid.height());
    let last_col = last(t.col_f(max_x), grid.width());
    if last_row < 0.0 || last_col < 0.0 {
        return;
    }

    for row in first(t.row_f(min_y))..=last_row as usize {
        for col in first(t.col_f(min_x))..=last_col as usize {
            let (px, py) = t.cell_center(row, col);
            let l1 = ((b.1 - c.1) * (px - c.0) + (c.0 - b.0) * (py - c.1)) / det;
            let l2 = ((c.1 - a.1) * (px - c.0) + (a.0 - c.0) * (py - c.1)) / det;
            let l3 = 1.0 - l1 - l2;
            if l1 < -HULL_EPSILON || l2 < -HULL_EPSILON || l3 < -HULL_EPSILON {
                continue;
            }
            let value = l1 * a.2 as f64 + l2 * b.2 as f64 + l3 * c.2 as f64;
            grid.set(row, col, value as f32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Rect;

    fn unit_transform(n: usize) -> GeoTransform {
        GeoTransform::from_bounds(&Rect::new((0.0, 0.0), (1.0, 1.0)), n, n)
    }

    #[test]
    fn unit_square_centre_is_between_corner_values() {
        let points = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let values = [10.0, 20.0, 30.0, 40.0];
        // 3x3 grid puts the middle cell centre at (0.5, 0.5)
        let grid = interpolate(&points, &values, &unit_transform(3), 3, 3, Method::Linear, f32::NAN)
            .unwrap();
        let centre = grid.get(1, 1);
        assert!((10.0..=40.0).contains(&centre), "centre was {centre}");
        assert!(grid.cells().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn linear_reproduces_samples_at_cell_centres() {
        let t = GeoTransform::from_bounds(&Rect::new((0.0, 0.0), (4.0, 4.0)), 4, 4);
        let points = [[0.5, 0.5], [3.5, 0.5], [0.5, 3.5], [3.5, 3.5], [1.5, 2.5]];
        let values = [5.0, 7.0, 9.0, 11.0, 13.0];
        let grid = interpolate(&points, &values, &t, 4, 4, Method::Linear, f32::NAN).unwrap();

        assert!((grid.get(2, 1) - 13.0).abs() < 1e-4);
        assert!((grid.get(0, 0) - 5.0).abs() < 1e-4);
        assert!((grid.get(0, 3) - 7.0).abs() < 1e-4);
        assert!((grid.get(3, 0) - 9.0).abs() < 1e-4);
        assert!((grid.get(3, 3) - 11.0).abs() < 1e-4);
    }

    #[test]
    fn linear_outside_hull_is_fill() {
        let t = GeoTransform::from_bounds(&Rect::new((0.0, 0.0), (10.0, 10.0)), 10, 10);
        let points = [[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]];
        let values = [1.0, 2.0, 3.0];
        let grid = interpolate(&points, &values, &t, 10, 10, Method::Linear, f32::NAN).unwrap();
        assert!(grid.get(0, 0).is_finite());
        assert!(grid.get(9, 9).is_nan());
        assert!(grid.get(5, 5).is_nan());
    }

    #[test]
    fn collinear_samples_cannot_be_fitted_linearly() {
        let points = [[0.0, 0.0], [0.5, 0.5], [1.0, 1.0]];
        let values = [1.0, 2.0, 3.0];
        let err = interpolate(&points, &values, &unit_transform(4), 4, 4, Method::Linear, f32::NAN)
            .unwrap_err();
        assert!(matches!(
            err,
            HeatmapError::InterpolationInput { required: 3, available: 3, .. }
        ));
    }

    #[test]
    fn two_samples_cannot_be_fitted_linearly() {
        let points = [[0.1, 0.1], [0.9, 0.7]];
        let err = interpolate(&points, &[1.0, 2.0], &unit_transform(4), 4, 4, Method::Linear, 0.0)
            .unwrap_err();
        assert!(matches!(err, HeatmapError::InterpolationInput { .. }));
    }

    #[test]
    fn nearest_picks_closest_sample_and_is_idempotent() {
        let t = GeoTransform::from_bounds(&Rect::new((0.0, 0.0), (8.0, 8.0)), 8, 8);
        let points = [[0.2, 0.2], [7.8, 0.2], [7.8, 7.8], [0.2, 7.8], [1.0, 1.0]];
        let values = [0.0, 0.0, 0.0, 0.0, 1.0];

        let first = interpolate(&points, &values, &t, 8, 8, Method::Nearest, 0.0).unwrap();
        let second = interpolate(&points, &values, &t, 8, 8, Method::Nearest, 0.0).unwrap();
        assert_eq!(first, second);

        assert_eq!(first.get(1, 1), 1.0);
        assert_eq!(first.get(6, 6), 0.0);
    }

    #[test]
    fn nearest_outside_hull_is_fill() {
        let t = GeoTransform::from_bounds(&Rect::new((0.0, 0.0), (10.0, 10.0)), 10, 10);
        let points = [[0.0, 0.0], [6.0, 0.0], [0.0, 6.0]];
        let values = [1.0, 1.0, 1.0];
        let grid = interpolate(&points, &values, &t, 10, 10, Method::Nearest, -5.0).unwrap();
        assert_eq!(grid.get(0, 0), 1.0);
        assert_eq!(grid.get(8, 8), -5.0);
        assert_eq!(grid.get(0, 9), -5.0);
    }

    #[test]
    fn nearest_without_samples_is_an_input_error() {
        let err = interpolate(&[], &[], &unit_transform(2), 2, 2, Method::Nearest, 0.0).unwrap_err();
        assert!(matches!(
            err,
            HeatmapError::InterpolationInput { available: 0, .. }
        ));
    }
}
