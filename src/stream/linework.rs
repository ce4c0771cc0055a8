//! Measure arithmetic along polylines: projection, substrings, and merging
//! of touching segments into connected components.

use ahash::AHashMap;
use geo::{Coord, LineString, Point};

use crate::geom::line_length;

/// Project a point onto a polyline. Returns the distance to the line, the
/// measure of the nearest position, and the nearest coordinate.
pub fn nearest_on_line(line: &LineString<f64>, pt: Point<f64>) -> (f64, f64, Coord<f64>) {
    let p = Coord { x: pt.x(), y: pt.y() };
    let mut best = (f64::INFINITY, 0.0, line.0[0]);
    let mut walked = 0.0;
    for seg in line.0.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let seg_len2 = dx * dx + dy * dy;
        let t = if seg_len2 > 0.0 {
            (((p.x - a.x) * dx + (p.y - a.y) * dy) / seg_len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let proj = Coord {
            x: a.x + t * dx,
            y: a.y + t * dy,
        };
        let dist = ((p.x - proj.x).powi(2) + (p.y - proj.y).powi(2)).sqrt();
        if dist < best.0 {
            best = (dist, walked + t * seg_len2.sqrt(), proj);
        }
        walked += seg_len2.sqrt();
    }
    best
}

/// Coordinate at a given measure along the line.
pub fn point_at(line: &LineString<f64>, measure: f64) -> Coord<f64> {
    let mut remaining = measure.max(0.0);
    for seg in line.0.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        if remaining <= len {
            let t = if len > 0.0 { remaining / len } else { 0.0 };
            return Coord {
                x: a.x + t * (b.x - a.x),
                y: a.y + t * (b.y - a.y),
            };
        }
        remaining -= len;
    }
    *line.0.last().unwrap()
}

/// The portion of the line between measures `m0` and `m1`.
pub fn substring(line: &LineString<f64>, m0: f64, m1: f64) -> LineString<f64> {
    let (m0, m1) = (m0.min(m1), m0.max(m1));
    let mut coords = vec![point_at(line, m0)];
    let mut walked = 0.0;
    for seg in line.0.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        let end = walked + len;
        if end > m0 && end < m1 {
            coords.push(b);
        }
        walked = end;
    }
    coords.push(point_at(line, m1));
    coords.dedup_by(|a, b| (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
    if coords.len() < 2 {
        let c = point_at(line, m0);
        return LineString(vec![c, c]);
    }
    LineString(coords)
}

fn key(c: Coord<f64>) -> (i64, i64) {
    // Endpoints within a millimeter are considered coincident.
    ((c.x * 1000.0).round() as i64, (c.y * 1000.0).round() as i64)
}

/// Group touching segments into connected components (the unsplit lines of
/// the traces). Components are ordered by their first member segment.
pub fn unsplit_lines(segments: Vec<LineString<f64>>) -> Vec<Vec<LineString<f64>>> {
    let n = segments.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut Vec<usize>, mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut by_endpoint: AHashMap<(i64, i64), usize> = AHashMap::new();
    for (i, seg) in segments.iter().enumerate() {
        for c in [*seg.0.first().unwrap(), *seg.0.last().unwrap()] {
            match by_endpoint.get(&key(c)) {
                Some(&j) => {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    if ri != rj {
                        let (lo, hi) = if ri < rj { (ri, rj) } else { (rj, ri) };
                        parent[hi] = lo;
                    }
                }
                None => {
                    by_endpoint.insert(key(c), i);
                }
            }
        }
    }

    let mut components: AHashMap<usize, Vec<LineString<f64>>> = AHashMap::new();
    let mut order: Vec<usize> = Vec::new();
    for (i, seg) in segments.into_iter().enumerate() {
        let root = find(&mut parent, i);
        if !components.contains_key(&root) {
            order.push(root);
        }
        components.entry(root).or_default().push(seg);
    }
    order
        .into_iter()
        .map(|root| components.remove(&root).unwrap())
        .collect()
}

/// Total length of a set of segments.
pub fn group_length(segments: &[LineString<f64>]) -> f64 {
    segments.iter().map(line_length).sum()
}
