use crate::error::HeatmapError;
use crate::grid::{GeoTransform, Grid};
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Line, LinesIter, MultiPolygon, Rect};
use rstar::{RTree, RTreeObject, AABB};
use tracing::warn;

// Ring edge tagged with its ring and position so neighbours along the same
// ring can be told apart from genuine crossings.
struct RingEdge {
    line: Line<f64>,
    ring: usize,
    index: usize,
    ring_len: usize,
}

impl RTreeObject for RingEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.line.start.x, self.line.start.y],
            [self.line.end.x, self.line.end.y],
        )
    }
}

impl RingEdge {
    fn is_adjacent(&self, other: &RingEdge) -> bool {
        if self.ring != other.ring {
            return false;
        }
        let diff = self.index.abs_diff(other.index);
        diff == 1 || diff == self.ring_len - 1
    }
}

fn ring_edges(polygon: &MultiPolygon<f64>) -> Vec<RingEdge> {
    let rings = polygon
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()));

    let mut edges = Vec::new();
    for (ring, line_string) in rings.enumerate() {
        let lines: Vec<Line<f64>> = line_string
            .lines()
            .filter(|l| l.start != l.end)
            .collect();
        let ring_len = lines.len();
        edges.extend(lines.into_iter().enumerate().map(|(index, line)| RingEdge {
            line,
            ring,
            index,
            ring_len,
        }));
    }
    edges
}

/// Checks that the polygon is non-empty, has area and no ring edges cross.
pub fn validate_polygon(polygon: &MultiPolygon<f64>) -> Result<(), HeatmapError> {
    if polygon.0.is_empty() {
        return Err(HeatmapError::Geometry("polygon is empty".into()));
    }
    if polygon.unsigned_area() <= 0.0 {
        return Err(HeatmapError::Geometry("polygon has zero area".into()));
    }

    let edges = ring_edges(polygon);
    let tree = RTree::bulk_load(edges);
    for edge in tree.iter() {
        for other in tree.locate_in_envelope_intersecting(&edge.envelope()) {
            if std::ptr::eq(edge, other) || edge.is_adjacent(other) {
                continue;
            }
            match line_intersection(edge.line, other.line) {
                Some(LineIntersection::SinglePoint { is_proper: true, intersection }) => {
                    return Err(HeatmapError::Geometry(format!(
                        "rings cross at ({}, {})",
                        intersection.x, intersection.y
                    )));
                }
                Some(LineIntersection::Collinear { intersection })
                    if intersection.start != intersection.end =>
                {
                    return Err(HeatmapError::Geometry(format!(
                        "ring edges overlap near ({}, {})",
                        intersection.start.x, intersection.start.y
                    )));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Rasterizes `polygon` onto a `height` x `width` grid spanning `bounds`.
///
/// A cell is set when the polygon covers any part of it: cells whose centre
/// lies inside (even-odd, so holes stay clear) plus every cell an edge passes
/// through or touches. Invalid geometry yields an all-false grid.
pub fn rasterize(
    polygon: &MultiPolygon<f64>,
    width: usize,
    height: usize,
    bounds: &Rect<f64>,
) -> Grid<bool> {
    let transform = GeoTransform::from_bounds(bounds, width, height);
    let mut mask = Grid::filled(width, height, transform, false);
    if width == 0 || height == 0 {
        return mask;
    }

    if let Err(e) = validate_polygon(polygon) {
        warn!("{e}; using an empty mask");
        return mask;
    }

    let lines: Vec<Line<f64>> = polygon.lines_iter().collect();
    fill_interior(&mut mask, &lines);
    for line in &lines {
        trace_edge(&mut mask, line);
    }
    mask
}

fn fill_interior(mask: &mut Grid<bool>, lines: &[Line<f64>]) {
    let t = *mask.transform();
    let width = mask.width();
    let mut crossings = Vec::new();

    for row in 0..mask.height() {
        let (_, yc) = t.cell_center(row, 0);
        crossings.clear();
        for l in lines {
            let (a, b) = (l.start, l.end);
            if (a.y <= yc) != (b.y <= yc) {
                crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        let cells = mask.row_mut(row);
        for pair in crossings.chunks_exact(2) {
            // first and last column whose centre lies in [pair[0], pair[1])
            let start = (t.col_f(pair[0]) - 0.5).ceil().max(0.0) as usize;
            let end = ((t.col_f(pair[1]) - 0.5).ceil().max(0.0) as usize).min(width);
            for cell in cells.iter_mut().take(end).skip(start) {
                *cell = true;
            }
        }
    }
}

// Marks every cell the segment passes through, one row strip at a time.
fn trace_edge(mask: &mut Grid<bool>, line: &Line<f64>) {
    let t = *mask.transform();
    let last_row = mask.height() as f64 - 1.0;
    let last_col = mask.width() as f64 - 1.0;
    let clamp_row = |v: f64| v.floor().clamp(0.0, last_row) as usize;
    let clamp_col = |v: f64| v.floor().clamp(0.0, last_col) as usize;

    let (a, b) = (line.start, line.end);
    let (y_lo, y_hi) = (a.y.min(b.y), a.y.max(b.y));
    let dy = b.y - a.y;

    for row in clamp_row(t.row_f(y_lo))..=clamp_row(t.row_f(y_hi)) {
        let (x_from, x_to) = if dy == 0.0 {
            (a.x, b.x)
        } else {
            let strip_lo = (t.origin_y + row as f64 * t.cell_height).max(y_lo);
            let strip_hi = (t.origin_y + (row + 1) as f64 * t.cell_height).min(y_hi);
            let x_at = |y: f64| a.x + (y - a.y) * (b.x - a.x) / dy;
            (x_at(strip_lo), x_at(strip_hi))
        };
        let c0 = clamp_col(t.col_f(x_from.min(x_to)));
        let c1 = clamp_col(t.col_f(x_from.max(x_to)));
        for cell in &mut mask.row_mut(row)[c0..=c1] {
            *cell = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, BoundingRect, Intersects, MultiPolygon, Polygon};

    fn multi(p: Polygon<f64>) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![p])
    }

    fn bounds_of(p: &MultiPolygon<f64>) -> Rect<f64> {
        p.bounding_rect().unwrap()
    }

    fn shrink(r: Rect<f64>, eps: f64) -> Rect<f64> {
        Rect::new(
            (r.min().x + eps, r.min().y + eps),
            (r.max().x - eps, r.max().y - eps),
        )
    }

    fn grow(r: Rect<f64>, eps: f64) -> Rect<f64> {
        shrink(r, -eps)
    }

    fn assert_all_touched(p: &MultiPolygon<f64>, width: usize, height: usize) {
        let bounds = bounds_of(p);
        let mask = rasterize(p, width, height, &bounds);
        let t = *mask.transform();
        for row in 0..height {
            for col in 0..width {
                let cell = t.cell_rect(row, col);
                if mask.get(row, col) {
                    assert!(
                        p.intersects(&grow(cell, 1e-9)),
                        "false positive at ({row}, {col})"
                    );
                } else {
                    assert!(
                        !p.intersects(&shrink(cell, 1e-9)),
                        "missed touched cell at ({row}, {col})"
                    );
                }
            }
        }
    }

    #[test]
    fn unit_square_fills_whole_grid() {
        let p = multi(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]);
        let mask = rasterize(&p, 8, 8, &bounds_of(&p));
        assert_eq!(mask.count_true(), 64);
    }

    #[test]
    fn triangle_is_all_touched_without_false_positives() {
        let p = multi(polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 3.0, y: 7.0)]);
        assert_all_touched(&p, 23, 17);
    }

    #[test]
    fn concave_polygon_is_all_touched() {
        let p = multi(polygon![
            (x: 0.0, y: 0.0), (x: 9.0, y: 0.0), (x: 9.0, y: 2.5),
            (x: 3.3, y: 2.5), (x: 3.3, y: 8.0), (x: 0.0, y: 8.0)
        ]);
        assert_all_touched(&p, 31, 29);
    }

    #[test]
    fn holes_stay_clear() {
        let p = multi(polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 3.0, y: 3.0), (x: 7.0, y: 3.0), (x: 7.0, y: 7.0), (x: 3.0, y: 7.0)]],
        ));
        let mask = rasterize(&p, 10, 10, &bounds_of(&p));
        // (5,5) lies deep inside the hole
        assert!(!mask.get(5, 5));
        assert!(mask.get(0, 0));
        assert!(mask.get(9, 9));
        assert_all_touched(&p, 20, 20);
    }

    #[test]
    fn self_intersecting_polygon_yields_empty_mask() {
        let bowtie = multi(polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 4.0), (x: 4.0, y: 0.0), (x: 0.0, y: 4.0)]);
        assert!(matches!(
            validate_polygon(&bowtie),
            Err(HeatmapError::Geometry(_))
        ));
        let mask = rasterize(&bowtie, 16, 16, &bounds_of(&bowtie));
        assert_eq!(mask.count_true(), 0);
    }

    #[test]
    fn empty_polygon_yields_empty_mask() {
        let empty: MultiPolygon<f64> = MultiPolygon::new(vec![]);
        let bounds = Rect::new((0.0, 0.0), (1.0, 1.0));
        let mask = rasterize(&empty, 4, 4, &bounds);
        assert_eq!(mask.count_true(), 0);
    }

    #[test]
    fn rasterize_is_deterministic() {
        let p = multi(polygon![(x: 0.0, y: 0.0), (x: 5.0, y: 1.0), (x: 4.0, y: 6.0), (x: -1.0, y: 3.0)]);
        let b = bounds_of(&p);
        assert_eq!(rasterize(&p, 40, 30, &b), rasterize(&p, 40, 30, &b));
    }
}
