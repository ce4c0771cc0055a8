//! Morphological buffering over `geo` types.
//!
//! Dilation unions round-ended capsules swept along every boundary segment
//! with the input; erosion subtracts the swept boundary from the input. The
//! two compose into the closing/opening operations the pipelines are built
//! from. Circular arcs are approximated with 16 vertices per semicircle.

use std::f64::consts::{FRAC_PI_2, PI};

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};

use crate::geom::union_all;

const ARC_STEPS: usize = 16;

/// Buffer a multipolygon by `dist` meters: outward for positive distances,
/// inward for negative. A zero distance returns the input unchanged.
pub fn buffer(mp: &MultiPolygon<f64>, dist: f64) -> MultiPolygon<f64> {
    if dist > 0.0 {
        dilate(mp, dist)
    } else if dist < 0.0 {
        erode(mp, -dist)
    } else {
        mp.clone()
    }
}

/// Buffer polylines by `dist` meters (always outward).
pub fn buffer_lines(lines: &[LineString<f64>], dist: f64) -> MultiPolygon<f64> {
    let mut pieces = Vec::new();
    for line in lines {
        sweep_line(line, dist, &mut pieces);
    }
    union_all(pieces.into_iter().map(MultiPolygon::from).collect())
}

/// A disk of the given radius, approximated by a 32-gon.
pub fn disk(center: Coord<f64>, radius: f64) -> Polygon<f64> {
    let n = ARC_STEPS * 2;
    let mut coords = Vec::with_capacity(n + 1);
    for i in 0..n {
        let t = 2.0 * PI * i as f64 / n as f64;
        coords.push(Coord {
            x: center.x + radius * t.cos(),
            y: center.y + radius * t.sin(),
        });
    }
    coords.push(coords[0]);
    Polygon::new(LineString(coords), vec![])
}

fn dilate(mp: &MultiPolygon<f64>, dist: f64) -> MultiPolygon<f64> {
    let mut swept = Vec::new();
    for poly in &mp.0 {
        sweep_line(poly.exterior(), dist, &mut swept);
        for hole in poly.interiors() {
            sweep_line(hole, dist, &mut swept);
        }
    }
    let mut pieces: Vec<MultiPolygon<f64>> =
        mp.0.iter().cloned().map(MultiPolygon::from).collect();
    pieces.extend(swept.into_iter().map(MultiPolygon::from));
    union_all(pieces)
}

fn erode(mp: &MultiPolygon<f64>, dist: f64) -> MultiPolygon<f64> {
    let mut strip = Vec::new();
    for poly in &mp.0 {
        sweep_line(poly.exterior(), dist, &mut strip);
        for hole in poly.interiors() {
            sweep_line(hole, dist, &mut strip);
        }
    }
    if strip.is_empty() {
        return mp.clone();
    }
    let strip = union_all(strip.into_iter().map(MultiPolygon::from).collect());
    mp.difference(&strip)
}

fn sweep_line(line: &LineString<f64>, radius: f64, out: &mut Vec<Polygon<f64>>) {
    if line.0.len() == 1 {
        out.push(disk(line.0[0], radius));
        return;
    }
    for seg in line.0.windows(2) {
        out.push(stadium(seg[0], seg[1], radius));
    }
}

/// Round-ended capsule around the segment a-b.
fn stadium(a: Coord<f64>, b: Coord<f64>, radius: f64) -> Polygon<f64> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-9 {
        return disk(a, radius);
    }
    let theta = dy.atan2(dx);
    let mut coords = Vec::with_capacity(2 * ARC_STEPS + 3);
    for i in 0..=ARC_STEPS {
        let t = theta - FRAC_PI_2 + PI * i as f64 / ARC_STEPS as f64;
        coords.push(Coord {
            x: b.x + radius * t.cos(),
            y: b.y + radius * t.sin(),
        });
    }
    for i in 0..=ARC_STEPS {
        let t = theta + FRAC_PI_2 + PI * i as f64 / ARC_STEPS as f64;
        coords.push(Coord {
            x: a.x + radius * t.cos(),
            y: a.y + radius * t.sin(),
        });
    }
    coords.push(coords[0]);
    Polygon::new(LineString(coords), vec![])
}
