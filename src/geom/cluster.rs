//! Proximity clustering of polygon features: connected components over an
//! R-tree candidate graph. This replaces the iterative expand-selection
//! loops of cursor-based GIS workflows with a single deterministic pass.

use geo::{BoundingRect, Intersects, Line, LineString, MultiPolygon, Polygon};
use rstar::{RTree, RTreeObject, AABB};

use crate::geom::point_seg_distance;

/// An index entry pairing a feature index with its bounding box.
pub struct IndexedBounds {
    pub idx: usize,
    aabb: AABB<[f64; 2]>,
}

impl IndexedBounds {
    pub fn from_geoms(geoms: &[MultiPolygon<f64>]) -> Vec<IndexedBounds> {
        geoms
            .iter()
            .enumerate()
            .filter_map(|(idx, mp)| {
                let rect = mp.bounding_rect()?;
                Some(IndexedBounds {
                    idx,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect()
    }
}

impl RTreeObject for IndexedBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Planar distance between two polygons; zero when they intersect (which
/// covers containment). Disjoint polygons realize their distance between
/// boundary segments, including hole rings.
pub fn poly_distance(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    if a.intersects(b) {
        return 0.0;
    }
    let rings = |p: &Polygon<f64>| -> Vec<LineString<f64>> {
        std::iter::once(p.exterior().clone())
            .chain(p.interiors().iter().cloned())
            .collect()
    };
    let mut best = f64::INFINITY;
    for ra in rings(a) {
        for rb in rings(b) {
            for sa in ra.0.windows(2) {
                for sb in rb.0.windows(2) {
                    if Line::new(sa[0], sa[1]).intersects(&Line::new(sb[0], sb[1])) {
                        return 0.0;
                    }
                    best = best
                        .min(point_seg_distance(sa[0], sb[0], sb[1]))
                        .min(point_seg_distance(sa[1], sb[0], sb[1]))
                        .min(point_seg_distance(sb[0], sa[0], sa[1]))
                        .min(point_seg_distance(sb[1], sa[0], sa[1]));
                }
            }
        }
    }
    best
}

/// Minimum planar distance between two multipolygons.
pub fn mp_distance(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    let mut best = f64::INFINITY;
    for pa in &a.0 {
        for pb in &b.0 {
            best = best.min(poly_distance(pa, pb));
            if best == 0.0 {
                return 0.0;
            }
        }
    }
    best
}

/// Group features whose shortest planar distance is at most `dist` into
/// clusters. Returns clusters ordered by their smallest member index, each
/// cluster's members in ascending index order, so the grouping is a pure
/// function of the input sequence.
pub fn cluster_within(geoms: &[MultiPolygon<f64>], dist: f64) -> Vec<Vec<usize>> {
    let entries = IndexedBounds::from_geoms(geoms);
    let tree = RTree::bulk_load(entries);
    let mut uf = UnionFind::new(geoms.len());

    for (i, mp) in geoms.iter().enumerate() {
        let Some(rect) = mp.bounding_rect() else { continue };
        let search = AABB::from_corners(
            [rect.min().x - dist, rect.min().y - dist],
            [rect.max().x + dist, rect.max().y + dist],
        );
        for cand in tree.locate_in_envelope_intersecting(&search) {
            let j = cand.idx;
            if j <= i || uf.find(i) == uf.find(j) {
                continue;
            }
            if mp_distance(mp, &geoms[j]) <= dist {
                uf.union(i, j);
            }
        }
    }

    let mut clusters: ahash::AHashMap<usize, Vec<usize>> = ahash::AHashMap::new();
    for i in 0..geoms.len() {
        clusters.entry(uf.find(i)).or_default().push(i);
    }
    let mut out: Vec<Vec<usize>> = clusters.into_values().collect();
    for members in &mut out {
        members.sort_unstable();
    }
    out.sort_by_key(|members| members[0]);
    out
}

/// Disjoint-set forest with path halving.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Attach the larger root index under the smaller, so cluster
            // representatives are reproducible.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}
