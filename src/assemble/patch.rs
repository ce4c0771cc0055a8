//! Split-site gap patching: when a ProtoSite ends up split into multiple
//! sites separated only by slivers, substantial stretches of near-contact
//! are bridged so the pieces rejoin.

use geo::{ConvexHull, Intersects, MultiPolygon};

use crate::geom::{buffer, clean_clip, clean_erase, dissolve, explode, perimeter};

/// Rejoin split sites that run very near each other for substantial
/// stretches. `site_search_dist` is the stitching distance of the assembler;
/// the patch band is 2.5 times that.
pub(crate) fn patch_gaps(
    splits: Vec<MultiPolygon<f64>>,
    site_search_dist: f64,
) -> Vec<MultiPolygon<f64>> {
    if splits.len() < 2 {
        return splits;
    }
    let patch_dist = 2.5 * site_search_dist;

    // Thin outside-only buffer around each split.
    let rings: Vec<MultiPolygon<f64>> = splits
        .iter()
        .map(|s| clean_erase(&buffer(s, patch_dist), s))
        .collect();
    let perims: Vec<f64> = splits.iter().map(perimeter).collect();

    let mut patches: Vec<MultiPolygon<f64>> = Vec::new();
    for i in 0..splits.len() {
        for j in (i + 1)..splits.len() {
            let overlap = clean_clip(&rings[i], &rings[j]);
            if overlap.0.is_empty() {
                continue;
            }
            // Keep only contact zones long enough to matter, judged against
            // the smaller of the two sites.
            let shorter = perims[i].min(perims[j]);
            let threshold = 1000.0_f64.max(shorter / 4.0);
            if perimeter(&overlap) <= threshold {
                continue;
            }
            if !splits.iter().any(|s| overlap.intersects(s)) {
                continue;
            }
            // Widen the contact zone a touch, trim it to the sites it
            // bridges, and square it off with its convex hull.
            let widened = buffer(&overlap, patch_dist * 1.02);
            let trimmed = clean_clip(&widened, &dissolve(&splits));
            if trimmed.0.is_empty() {
                continue;
            }
            let hull = MultiPolygon(vec![trimmed.convex_hull()]);
            patches.push(clean_clip(&widened, &hull));
        }
    }

    if patches.is_empty() {
        return splits;
    }
    let mut pieces = splits;
    pieces.extend(patches);
    explode(&dissolve(&pieces))
        .into_iter()
        .map(MultiPolygon::from)
        .collect()
}
