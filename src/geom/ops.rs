//! Semantic wrappers over the boolean-op primitives: dissolve, clean
//! clip/erase, part and hole elimination, generalization, and the canonical
//! ring ordering that keeps repeated runs byte-identical.

use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon, Simplify};

/// Union a collection of multipolygons into one, pairing inputs in a
/// balanced tree so the cost stays near O(n log n) boolean ops.
pub fn union_all(mut pieces: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    pieces.retain(|mp| !mp.0.is_empty());
    if pieces.is_empty() {
        return MultiPolygon(vec![]);
    }
    while pieces.len() > 1 {
        let mut next = Vec::with_capacity(pieces.len() / 2 + 1);
        let mut iter = pieces.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        pieces = next;
    }
    pieces.pop().unwrap()
}

/// Dissolve a feature collection into a single multipolygon.
pub fn dissolve(feats: &[MultiPolygon<f64>]) -> MultiPolygon<f64> {
    union_all(feats.to_vec())
}

/// Explode a multipolygon into its single-part polygons.
pub fn explode(mp: &MultiPolygon<f64>) -> Vec<Polygon<f64>> {
    mp.0.to_vec()
}

/// Clip: the part of `a` inside `b`.
pub fn clean_clip(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if a.0.is_empty() || b.0.is_empty() {
        return MultiPolygon(vec![]);
    }
    a.intersection(b)
}

/// Erase: `a` minus `b`.
pub fn clean_erase(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if a.0.is_empty() {
        return MultiPolygon(vec![]);
    }
    if b.0.is_empty() {
        return a.clone();
    }
    a.difference(b)
}

/// Unsigned area of a single ring.
pub fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).unsigned_area()
}

/// Planar length of a polyline.
pub fn line_length(line: &LineString<f64>) -> f64 {
    line.0
        .windows(2)
        .map(|seg| ((seg[1].x - seg[0].x).powi(2) + (seg[1].y - seg[0].y).powi(2)).sqrt())
        .sum()
}

/// Planar distance from a point to a segment.
pub fn point_seg_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (px, py) = (a.x + t * dx - p.x, a.y + t * dy - p.y);
    (px * px + py * py).sqrt()
}

/// Total boundary length of a multipolygon (exterior rings plus holes).
pub fn perimeter(mp: &MultiPolygon<f64>) -> f64 {
    mp.0.iter()
        .map(|poly| {
            line_length(poly.exterior())
                + poly.interiors().iter().map(line_length).sum::<f64>()
        })
        .sum()
}

/// Remove interior rings (holes) with area at or below `max_area` m².
pub fn fill_holes_area(mp: &MultiPolygon<f64>, max_area: f64) -> MultiPolygon<f64> {
    MultiPolygon(
        mp.0.iter()
            .map(|poly| {
                let interiors = poly
                    .interiors()
                    .iter()
                    .filter(|ring| ring_area(ring) > max_area)
                    .cloned()
                    .collect();
                Polygon::new(poly.exterior().clone(), interiors)
            })
            .collect(),
    )
}

/// Remove interior rings smaller than `pct` percent of their polygon's
/// outer-ring area.
pub fn fill_holes_pct(mp: &MultiPolygon<f64>, pct: f64) -> MultiPolygon<f64> {
    MultiPolygon(
        mp.0.iter()
            .map(|poly| {
                let outer = ring_area(poly.exterior());
                let interiors = poly
                    .interiors()
                    .iter()
                    .filter(|ring| ring_area(ring) >= pct / 100.0 * outer)
                    .cloned()
                    .collect();
                Polygon::new(poly.exterior().clone(), interiors)
            })
            .collect(),
    )
}

/// Drop single-part pieces smaller than `pct` percent of `ref_area` m².
pub fn drop_small_parts(mp: &MultiPolygon<f64>, pct: f64, ref_area: f64) -> MultiPolygon<f64> {
    let cutoff = pct / 100.0 * ref_area;
    MultiPolygon(
        mp.0.iter()
            .filter(|poly| poly.unsigned_area() >= cutoff)
            .cloned()
            .collect(),
    )
}

/// Reduce vertex count with a Douglas-Peucker pass of tolerance `eps`.
/// Degenerate rings left with fewer than four coordinates are dropped.
pub fn generalize(mp: &MultiPolygon<f64>, eps: f64) -> MultiPolygon<f64> {
    MultiPolygon(
        mp.0.iter()
            .filter_map(|poly| {
                let exterior = poly.exterior().simplify(&eps);
                if exterior.0.len() < 4 {
                    return None;
                }
                let interiors = poly
                    .interiors()
                    .iter()
                    .map(|ring| ring.simplify(&eps))
                    .filter(|ring| ring.0.len() >= 4)
                    .collect();
                Some(Polygon::new(exterior, interiors))
            })
            .collect(),
    )
}

/// Rewrite a multipolygon into canonical form: every ring rotated to start
/// at its lexicographically least vertex, holes sorted, polygons sorted by
/// their minimum vertex. Geometrically a no-op.
pub fn canonicalize(mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let mut polys: Vec<Polygon<f64>> = mp
        .0
        .iter()
        .map(|poly| {
            let exterior = canonical_ring(poly.exterior());
            let mut interiors: Vec<LineString<f64>> =
                poly.interiors().iter().map(canonical_ring).collect();
            interiors.sort_by(|a, b| cmp_coords(&a.0[0], &b.0[0]));
            Polygon::new(exterior, interiors)
        })
        .collect();
    polys.sort_by(|a, b| cmp_coords(&a.exterior().0[0], &b.exterior().0[0]));
    MultiPolygon(polys)
}

fn canonical_ring(ring: &LineString<f64>) -> LineString<f64> {
    // Open the ring, rotate to the least vertex, close it again.
    let mut coords = ring.0.clone();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.is_empty() {
        return ring.clone();
    }
    let min_idx = coords
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| cmp_coords(a, b))
        .map(|(i, _)| i)
        .unwrap_or(0);
    coords.rotate_left(min_idx);
    coords.push(coords[0]);
    LineString(coords)
}

fn cmp_coords(a: &geo::Coord<f64>, b: &geo::Coord<f64>) -> std::cmp::Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}
