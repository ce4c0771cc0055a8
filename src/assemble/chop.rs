//! ChopMod: erase modifier features out of PFs and SBBs, keep only the
//! fragments that still hang together around surviving PF parts, and carve
//! the re-clustered fragments back out of the erase features.

use anyhow::Result;
use geo::{Area, Intersects, MultiPolygon};

use crate::geom::{
    clean_erase, cluster_within, drop_small_parts, explode, shrink_wrap, union_all,
};

/// Result of one ChopMod pass over a ProtoSite.
pub(crate) struct ChopOutput {
    /// Shrink-wrapped clusters of retained SBB fragments and PF parts.
    pub clusters: Vec<MultiPolygon<f64>>,
    /// The erase features minus the clusters, so retained fragments are no
    /// longer erased downstream.
    pub sub_erase: MultiPolygon<f64>,
    /// SFIDs of PFs that the modifiers erased completely.
    pub erased_pfs: Vec<String>,
}

const PF_PART_MIN_PCT: f64 = 1.0;
const SBB_PART_MIN_PCT: f64 = 25.0;

pub(crate) fn chop_mod(
    pfs: &[(String, MultiPolygon<f64>)],
    sbbs: &[(String, MultiPolygon<f64>)],
    erase: &MultiPolygon<f64>,
    search_dist: f64,
    smth_dist: f64,
) -> Result<ChopOutput> {
    // Chop the PFs, keeping parts of at least 1% of the original PF. Erring
    // small here: throwing away PF area is worse than keeping slivers.
    // Ordered by SFID so fragment processing order is reproducible.
    let mut erased_pfs = Vec::new();
    let mut pf_parts: std::collections::BTreeMap<&str, Vec<MultiPolygon<f64>>> =
        std::collections::BTreeMap::new();
    for (sfid, geom) in pfs {
        let chopped = clean_erase(geom, erase);
        let kept = drop_small_parts(&chopped, PF_PART_MIN_PCT, geom.unsigned_area());
        if kept.0.is_empty() {
            erased_pfs.push(sfid.clone());
            continue;
        }
        pf_parts.insert(
            sfid.as_str(),
            explode(&kept).into_iter().map(MultiPolygon::from).collect(),
        );
    }

    // Chop the SBBs and pick, per PF, the fragments worth keeping: the
    // substantial ones plus any touching a retained PF part, expanded to
    // fragments within the search distance of that seed set.
    let mut retained: Vec<MultiPolygon<f64>> = Vec::new();
    for (sfid, geom) in sbbs {
        let Some(parts) = pf_parts.get(sfid.as_str()) else {
            continue;
        };
        let chopped = clean_erase(geom, erase);
        let total = chopped.unsigned_area();
        let pieces: Vec<MultiPolygon<f64>> = explode(&chopped)
            .into_iter()
            .map(MultiPolygon::from)
            .collect();

        let candidates: Vec<MultiPolygon<f64>> = pieces
            .into_iter()
            .filter(|piece| {
                piece.unsigned_area() >= SBB_PART_MIN_PCT / 100.0 * total
                    || parts.iter().any(|p| piece.intersects(p))
            })
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let seeds: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, piece)| parts.iter().any(|p| piece.intersects(p)))
            .map(|(i, _)| i)
            .collect();
        for members in cluster_within(&candidates, search_dist) {
            if members.iter().any(|m| seeds.contains(m)) {
                retained.extend(members.into_iter().map(|m| candidates[m].clone()));
            }
        }
    }

    // Add the retained PF parts back, then stitch fragments within the
    // search distance into smooth clusters.
    for parts in pf_parts.values() {
        retained.extend(parts.iter().cloned());
    }
    let clusters = if retained.is_empty() {
        Vec::new()
    } else {
        shrink_wrap(&retained, search_dist.max(0.1), smth_dist)?
    };

    let sub_erase = clean_erase(erase, &union_all(clusters.clone()));

    Ok(ChopOutput {
        clusters,
        sub_erase,
        erased_pfs,
    })
}
