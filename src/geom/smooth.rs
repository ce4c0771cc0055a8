//! Boundary smoothing with an exponential kernel: each vertex of a
//! densified ring is replaced by the kernel-weighted average of the vertices
//! within half the smoothing tolerance along the boundary.

use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::geom::line_length;

/// Smooth polygon boundaries with a kernel of width `dist` meters.
pub fn smooth_paek(mp: &MultiPolygon<f64>, dist: f64) -> MultiPolygon<f64> {
    if dist <= 0.0 {
        return mp.clone();
    }
    MultiPolygon(
        mp.0.iter()
            .filter_map(|poly| {
                let exterior = smooth_ring(poly.exterior(), dist)?;
                let interiors = poly
                    .interiors()
                    .iter()
                    .filter_map(|ring| smooth_ring(ring, dist))
                    .collect();
                Some(Polygon::new(exterior, interiors))
            })
            .collect(),
    )
}

fn smooth_ring(ring: &LineString<f64>, dist: f64) -> Option<LineString<f64>> {
    let total = line_length(ring);
    if total <= 0.0 || ring.0.len() < 4 {
        return None;
    }
    // A window wider than the ring itself would collapse it to a point.
    let half = (dist / 2.0).min(total / 4.0);
    let step = (half / 4.0).max(total / 4096.0);

    let dense = densify_ring(ring, step);
    let n = dense.len();
    let window = ((half / step).ceil() as usize).min(n / 2);

    let mut coords = Vec::with_capacity(n + 1);
    for i in 0..n {
        let (mut sx, mut sy, mut sw) = (0.0, 0.0, 0.0);
        for k in 0..=(2 * window) {
            let offset = k as isize - window as isize;
            let j = (i as isize + offset).rem_euclid(n as isize) as usize;
            let s = offset.unsigned_abs() as f64 * step;
            let w = (-(3.0 * s / half.max(f64::MIN_POSITIVE)).powi(2)).exp();
            sx += dense[j].x * w;
            sy += dense[j].y * w;
            sw += w;
        }
        coords.push(Coord {
            x: sx / sw,
            y: sy / sw,
        });
    }
    coords.push(coords[0]);
    Some(LineString(coords))
}

/// Resample a closed ring at roughly `step` spacing, keeping original
/// vertices.
fn densify_ring(ring: &LineString<f64>, step: f64) -> Vec<Coord<f64>> {
    let mut out = Vec::new();
    for seg in ring.0.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        out.push(a);
        let len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        let pieces = (len / step).floor() as usize;
        for k in 1..pieces {
            let t = k as f64 / pieces as f64;
            out.push(Coord {
                x: a.x + t * (b.x - a.x),
                y: a.y + t * (b.y - a.y),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use geo::{Area, Centroid, Coord, LineString, Polygon};

    use super::*;

    #[test]
    fn smoothing_preserves_location_and_rounds_corners() {
        let square = MultiPolygon(vec![Polygon::new(
            LineString(vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 1000.0, y: 0.0 },
                Coord { x: 1000.0, y: 1000.0 },
                Coord { x: 0.0, y: 1000.0 },
                Coord { x: 0.0, y: 0.0 },
            ]),
            vec![],
        )]);
        let smoothed = smooth_paek(&square, 120.0);
        assert_eq!(smoothed.0.len(), 1);

        let c0 = square.centroid().unwrap();
        let c1 = smoothed.centroid().unwrap();
        assert!((c0.x() - c1.x()).abs() < 1.0);
        assert!((c0.y() - c1.y()).abs() < 1.0);

        // Corner clipping loses a little area, but only a little.
        let area = smoothed.unsigned_area();
        assert!(area > 0.95 * 1_000_000.0 && area <= 1_000_000.0 + 1.0);
    }

    #[test]
    fn degenerate_rings_are_dropped() {
        let sliver = MultiPolygon(vec![Polygon::new(
            LineString(vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 0.0, y: 0.0 },
            ]),
            vec![],
        )]);
        assert!(smooth_paek(&sliver, 50.0).0.is_empty());
    }
}
