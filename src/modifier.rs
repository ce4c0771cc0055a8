//! Preparation of the modifier layers (hydrography, transportation
//! surfaces, manual exclusions) used to erase and split site polygons.

use anyhow::Result;
use geo::{Area, Intersects, MultiPolygon};

use crate::geom::{clean_clip, clean_erase, coalesce, dissolve, explode};
use crate::types::{HydroFeat, ModFeat, NwiFeat};

/// Bundle of modifier layers consumed by the site assembler.
#[derive(Clone, Debug, Default)]
pub struct ModifierSet {
    pub hydro: Vec<HydroFeat>,
    pub transport: Vec<ModFeat>,
    pub exclusions: Vec<ModFeat>,
    /// Habitat core polygons used by the SBB expander.
    pub cores: Vec<MultiPolygon<f64>>,
    /// NWI wetlands with pre-parsed rule columns, used by the SBB builder.
    pub nwi: Vec<NwiFeat>,
}

impl ModifierSet {
    /// Hydro features eligible as erasers (`Hydro = 1`).
    pub fn eraser_hydro(&self) -> Vec<MultiPolygon<f64>> {
        self.hydro
            .iter()
            .filter(|h| h.is_eraser())
            .map(|h| h.geom.clone())
            .collect()
    }

    /// Transportation surfaces not flagged `NH_IGNORE`.
    pub fn active_transport(&self) -> Vec<MultiPolygon<f64>> {
        self.transport
            .iter()
            .filter(|m| m.is_active())
            .map(|m| m.geom.clone())
            .collect()
    }

    /// Exclusion polygons not flagged `NH_IGNORE`.
    pub fn active_exclusions(&self) -> Vec<MultiPolygon<f64>> {
        self.exclusions
            .iter()
            .filter(|m| m.is_active())
            .map(|m| m.geom.clone())
            .collect()
    }
}

/// Turn selected features into erase features: a negative-then-positive
/// buffer pair removes portions narrower than `2 * elim_dist`, and the
/// preserve features (PFs) are punched out so they can never be erased.
pub fn get_erase_feats(
    feats: &MultiPolygon<f64>,
    elim_dist: f64,
    preserve: &[MultiPolygon<f64>],
) -> Result<MultiPolygon<f64>> {
    if feats.0.is_empty() {
        return Ok(MultiPolygon(vec![]));
    }
    let thinned = coalesce(feats, -elim_dist)?;
    if thinned.0.is_empty() {
        return Ok(thinned);
    }
    let restored = coalesce(&thinned, elim_dist)?;
    Ok(clean_erase(&restored, &dissolve(preserve)))
}

/// Remove erase-feature parts that would swallow a guarded feature: a part
/// covering at least `per_cov` percent of any guarded feature is dropped.
/// The default cutoff of 100 removes only parts that fully cover one.
pub fn cull_erase_feats(
    erase: &MultiPolygon<f64>,
    guarded: &[MultiPolygon<f64>],
    per_cov: f64,
) -> MultiPolygon<f64> {
    let parts = explode(erase);
    let kept = parts
        .into_iter()
        .filter(|part| {
            let part_mp = MultiPolygon(vec![part.clone()]);
            let max_cov = guarded
                .iter()
                .filter(|g| g.intersects(part))
                .map(|g| {
                    let total = g.unsigned_area();
                    if total <= 0.0 {
                        return 0.0;
                    }
                    100.0 * clean_clip(g, &part_mp).unsigned_area() / total
                })
                .fold(0.0_f64, f64::max);
            max_cov < per_cov
        })
        .collect();
    MultiPolygon(kept)
}
