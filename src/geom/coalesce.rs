//! The two composite smoothing operations everything downstream leans on.
//!
//! `coalesce` is morphological closing (d > 0) or opening (d < 0) built from
//! a buffer pair: features within 2d of each other merge, and passages
//! narrower than 2|d| split. `shrink_wrap` groups nearby features and closes
//! each group into one smooth shape.

use anyhow::{bail, Result};
use geo::MultiPolygon;

use crate::geom::{
    buffer, cluster_within, dissolve, explode, fill_holes_area, fill_holes_pct, generalize,
    mp_distance,
};

/// Dilate-then-erode (d > 0) or erode-then-dilate (d < 0) by |d| meters.
///
/// Between the passes, enclosed gaps of up to 900 m² are filled and the
/// boundary is generalized by 0.1 m to bound vertex growth. A zero distance
/// is a caller error.
pub fn coalesce(feats: &MultiPolygon<f64>, dist: f64) -> Result<MultiPolygon<f64>> {
    if dist == 0.0 {
        bail!("coalesce requires a non-zero dilation distance");
    }
    if feats.0.is_empty() {
        return Ok(MultiPolygon(vec![]));
    }
    let out = if dist > 0.0 {
        let grown = buffer(feats, dist);
        let grown = generalize(&grown, 0.1);
        let grown = fill_holes_area(&grown, 900.0);
        buffer(&grown, -dist)
    } else {
        let shrunk = buffer(feats, dist);
        let shrunk = generalize(&shrunk, 0.1);
        let shrunk = fill_holes_area(&shrunk, 900.0);
        buffer(&shrunk, -dist)
    };
    Ok(out)
}

/// Cluster features within `search_dist` of each other, close each cluster
/// by `smth_dist`, and drop interior gaps under 1% of the cluster area.
/// Returns one smoothed multipolygon per cluster, ordered by the cluster's
/// first member; clusters are independent, so order never changes content.
pub fn shrink_wrap(
    feats: &[MultiPolygon<f64>],
    search_dist: f64,
    smth_dist: f64,
) -> Result<Vec<MultiPolygon<f64>>> {
    if search_dist <= 0.0 {
        bail!("shrink_wrap requires a positive search distance");
    }
    let parts: Vec<MultiPolygon<f64>> = explode(&dissolve(feats))
        .into_iter()
        .map(MultiPolygon::from)
        .collect();
    if parts.is_empty() {
        return Ok(vec![]);
    }

    let mut out = Vec::new();
    for members in cluster_within(&parts, search_dist) {
        let cluster: Vec<geo::Polygon<f64>> = members
            .iter()
            .flat_map(|&i| parts[i].0.iter().cloned())
            .collect();
        let smoothed = coalesce(&MultiPolygon(cluster), smth_dist)?;
        out.push(fill_holes_pct(&smoothed, 1.0));
    }
    Ok(out)
}

/// Keep only fragments whose shortest distance to any reference feature is
/// within `search_dist`; zero means the fragment must touch a reference.
pub fn cull_frags(
    frags: Vec<MultiPolygon<f64>>,
    refs: &[MultiPolygon<f64>],
    search_dist: f64,
) -> Vec<MultiPolygon<f64>> {
    frags
        .into_iter()
        .filter(|frag| refs.iter().any(|r| mp_distance(frag, r) <= search_dist))
        .collect()
}
