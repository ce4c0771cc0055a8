//! The EO ↔ site relation: a type-matched spatial join with a slop
//! tolerance, materialized as index pairs and rebuilt whenever either side
//! changes. Nothing here tries to keep the two sides mutually consistent
//! mid-pass.

use geo::BoundingRect;
use rstar::{RTree, AABB};

use crate::geom::{mp_distance, IndexedBounds};
use crate::types::{ElementOccurrence, RankedSite, Tier};

/// All (eo, site) pairs of matching site type within `slop` meters.
pub(crate) fn join_pairs(
    eos: &[ElementOccurrence],
    sites: &[RankedSite],
    slop: f64,
) -> Vec<(usize, usize)> {
    let site_geoms: Vec<_> = sites.iter().map(|s| s.site.geom.clone()).collect();
    let tree = RTree::bulk_load(IndexedBounds::from_geoms(&site_geoms));

    let mut pairs = Vec::new();
    for (ei, eo) in eos.iter().enumerate() {
        let Some(rect) = eo.geom.bounding_rect() else { continue };
        let search = AABB::from_corners(
            [rect.min().x - slop, rect.min().y - slop],
            [rect.max().x + slop, rect.max().y + slop],
        );
        let mut hits: Vec<usize> = tree
            .locate_in_envelope_intersecting(&search)
            .map(|entry| entry.idx)
            .filter(|&si| eo.site_kinds.contains(&sites[si].site.kind))
            .filter(|&si| mp_distance(&eo.geom, &sites[si].site.geom) <= slop)
            .collect();
        hits.sort_unstable();
        pairs.extend(hits.into_iter().map(|si| (ei, si)));
    }
    pairs
}

/// Per-site text summary counting joined eligible EOs by tier.
pub(crate) fn tier_summary_text(
    site_idx: usize,
    pairs: &[(usize, usize)],
    eos: &[ElementOccurrence],
) -> String {
    let tiers = [
        Tier::Irreplaceable,
        Tier::Critical,
        Tier::Vital,
        Tier::HighPriority,
        Tier::General,
    ];
    let mut counts = [0usize; 5];
    for &(ei, si) in pairs {
        if si != site_idx || !eos[ei].is_eligible() {
            continue;
        }
        if let Some(pos) = tiers.iter().position(|t| *t == eos[ei].tier) {
            counts[pos] += 1;
        }
    }
    let parts: Vec<String> = tiers
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(tier, count)| format!("{tier}: {count}"))
        .collect();
    if parts.is_empty() {
        "No essential EOs".to_string()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::fixtures::{eo_at, square};
    use crate::types::{Site, SiteKind};

    fn site_at(id: &str, kind: SiteKind, x0: f64) -> RankedSite {
        RankedSite::new(Site {
            site_id: id.to_string(),
            site_name: String::new(),
            kind,
            brank: None,
            geom: square(x0, 0.0, 1000.0),
        })
    }

    #[test]
    fn join_respects_slop_and_type() {
        let eos = vec![
            eo_at("AAAAA00001", 1, 100.0, 100.0),   // inside site 0
            eo_at("AAAAA00001", 2, 1010.0, 0.0),    // 10 m from site 0
            eo_at("AAAAA00001", 3, 5000.0, 0.0),    // far away
        ];
        let sites = vec![
            site_at("cs1", SiteKind::Tcs, 0.0),
            site_at("ahz1", SiteKind::Ahz, 0.0), // type mismatch
        ];
        let pairs = join_pairs(&eos, &sites, 15.0);
        assert_eq!(pairs, vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn summary_text_counts_by_tier() {
        let mut eos = vec![
            eo_at("AAAAA00001", 1, 0.0, 0.0),
            eo_at("BBBBB00001", 2, 200.0, 0.0),
        ];
        eos[0].tier = Tier::Irreplaceable;
        eos[1].tier = Tier::HighPriority;
        let pairs = vec![(0, 0), (1, 0)];
        let text = tier_summary_text(0, &pairs, &eos);
        assert_eq!(text, "Irreplaceable: 1; High Priority: 1");
    }
}
