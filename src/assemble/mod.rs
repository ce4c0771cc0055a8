//! The site assembler: clusters SBBs into ProtoSites, then rewrites each
//! ProtoSite through the chop/reassemble passes into final Conservation
//! Site polygons.

mod chop;
mod patch;

use anyhow::{Context, Result};
use geo::{Intersects, MultiPolygon};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::geom::{
    buffer, canonicalize, clean_clip, clean_erase, coalesce, cull_frags, dissolve, explode,
    fill_holes_pct, generalize, shrink_wrap, union_all,
};
use crate::modifier::{cull_erase_feats, get_erase_feats, ModifierSet};
use crate::types::{ProcFeat, Sbb, Site, SiteKind};
use crate::workspace::Workspace;

/// Distances and cutoffs of the assembly passes. The defaults are the
/// production values; they rarely need to change together.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct AssembleParams {
    /// SBBs within this distance cluster into one ProtoSite.
    pub cluster_dist: f64,
    /// Dilation distance smoothing ProtoSite boundaries.
    pub smth_dist: f64,
    /// Processing envelope added around each ProtoSite.
    pub buff_dist: f64,
    /// Hydro features covering at least this percent of an SBB are culled
    /// from the erasers.
    pub hydro_per_cov: f64,
    /// Hydro narrower than twice this distance never splits a site.
    pub hydro_elim_dist: f64,
    /// Fragment-cull distance from PFs (zero: must touch).
    pub search_dist: f64,
    /// Stitching distance for split fragments and sites.
    pub site_search_dist: f64,
    /// Smoothing distance for fragment- and site-level coalescing.
    pub site_smth_dist: f64,
}

impl Default for AssembleParams {
    fn default() -> Self {
        Self {
            cluster_dist: 500.0,
            smth_dist: 2000.0,
            buff_dist: 50.0,
            hydro_per_cov: 100.0,
            hydro_elim_dist: 10.0,
            search_dist: 0.0,
            site_search_dist: 20.0,
            site_smth_dist: 10.0,
        }
    }
}

/// Non-fatal problems of one assembly run.
#[derive(Clone, Debug, Default)]
pub struct AssembleReport {
    /// ProtoSites whose processing failed, with the error text.
    pub failed_protosites: Vec<(usize, String)>,
    /// ProtoSites left with no fragments after erasing.
    pub empty_protosites: Vec<usize>,
    /// PFs completely erased by modification features.
    pub erased_pfs: Vec<String>,
}

/// Assemble Conservation Sites of the given class from SBBs and PFs.
/// Only the terrestrial and AHZ classes run through this engine; stream
/// sites have their own delineator.
pub fn assemble_sites(
    sbbs: &[Sbb],
    pfs: &[ProcFeat],
    modifiers: &ModifierSet,
    kind: SiteKind,
    params: &AssembleParams,
    ws: &Workspace,
) -> Result<(Vec<Site>, AssembleReport)> {
    anyhow::ensure!(
        matches!(kind, SiteKind::Tcs | SiteKind::Ahz),
        "site assembler handles TCS and AHZ only, got {kind}"
    );
    anyhow::ensure!(!sbbs.is_empty(), "no SBBs to assemble");

    // ProtoSites: shrink-wrapped SBB clusters, exploded to single parts.
    let sbb_geoms: Vec<MultiPolygon<f64>> = sbbs.iter().map(|s| s.geom.clone()).collect();
    let protos: Vec<MultiPolygon<f64>> =
        shrink_wrap(&sbb_geoms, params.cluster_dist, params.smth_dist)?
            .iter()
            .flat_map(explode)
            .map(|poly| generalize(&MultiPolygon(vec![poly]), 0.1))
            .filter(|mp| !mp.0.is_empty())
            .collect();
    info!(count = protos.len(), "ProtoSites created");
    ws.dump("protosites", &protos);

    let results: Vec<(usize, Result<(Vec<MultiPolygon<f64>>, Vec<String>)>)> = protos
        .par_iter()
        .enumerate()
        .map(|(idx, ps)| (idx, process_protosite(ps, sbbs, pfs, modifiers, kind, params)))
        .collect();

    let mut report = AssembleReport::default();
    let mut sites = Vec::new();
    for (idx, result) in results {
        match result {
            Ok((bounds, erased)) => {
                if bounds.is_empty() {
                    warn!(
                        protosite = idx,
                        "no fragments remaining; you may need to edit modification features"
                    );
                    report.empty_protosites.push(idx);
                }
                report.erased_pfs.extend(erased);
                for geom in bounds {
                    let seq = sites.len() + 1;
                    sites.push(Site {
                        site_id: format!("{kind}-{seq:04}"),
                        site_name: String::new(),
                        kind,
                        brank: None,
                        geom,
                    });
                }
            }
            Err(err) => {
                warn!(protosite = idx, %err, "ProtoSite processing failed");
                report.failed_protosites.push((idx, format!("{err:#}")));
            }
        }
    }
    if !report.erased_pfs.is_empty() {
        report.erased_pfs.sort();
        report.erased_pfs.dedup();
        warn!(
            "PFs erased by modification features: {}; consider editing the \
             modifiers or PFs",
            report.erased_pfs.join(", ")
        );
    }
    info!(sites = sites.len(), "site assembly complete");
    ws.dump(
        "consites",
        &sites.iter().map(|s| s.geom.clone()).collect::<Vec<_>>(),
    );
    Ok((sites, report))
}

fn process_protosite(
    ps: &MultiPolygon<f64>,
    sbbs: &[Sbb],
    pfs: &[ProcFeat],
    modifiers: &ModifierSet,
    kind: SiteKind,
    params: &AssembleParams,
) -> Result<(Vec<MultiPolygon<f64>>, Vec<String>)> {
    let terrestrial = kind == SiteKind::Tcs;
    let envelope = buffer(ps, params.buff_dist);

    // Subset SBBs and PFs to this ProtoSite.
    let sbbs_in: Vec<(String, MultiPolygon<f64>)> = sbbs
        .iter()
        .filter(|s| s.geom.intersects(ps))
        .map(|s| (s.sfid.clone(), s.geom.clone()))
        .collect();
    let pfs_in: Vec<(String, MultiPolygon<f64>)> = pfs
        .iter()
        .filter(|pf| sbbs_in.iter().any(|(sfid, _)| *sfid == pf.sfid))
        .map(|pf| (pf.sfid.clone(), pf.geom.clone()))
        .collect();
    let sbb_geoms: Vec<MultiPolygon<f64>> =
        sbbs_in.iter().map(|(_, g)| g.clone()).collect();
    let pf_geoms: Vec<MultiPolygon<f64>> = pfs_in.iter().map(|(_, g)| g.clone()).collect();

    // Clip modifier features to the processing envelope.
    let clip_to_envelope = |feats: Vec<MultiPolygon<f64>>| -> MultiPolygon<f64> {
        union_all(
            feats
                .into_iter()
                .filter(|f| f.intersects(&envelope))
                .map(|f| clean_clip(&f, &envelope))
                .collect(),
        )
    };
    let hydro_clip = clip_to_envelope(modifiers.eraser_hydro());
    let excl_clip = if terrestrial {
        clip_to_envelope(modifiers.active_exclusions())
    } else {
        MultiPolygon(vec![])
    };
    let trans_clip = if terrestrial {
        clip_to_envelope(modifiers.active_transport())
    } else {
        MultiPolygon(vec![])
    };

    // Hydro erasers: cull those swallowing an SBB, drop narrow water, and
    // keep the PFs themselves un-erasable.
    let hydro_rtn = cull_erase_feats(&hydro_clip, &sbb_geoms, params.hydro_per_cov);
    let hydro_erase = get_erase_feats(&hydro_rtn, params.hydro_elim_dist, &pf_geoms)
        .context("hydro erase features")?;

    let merged_erase = if terrestrial {
        union_all(vec![excl_clip.clone(), trans_clip, hydro_erase])
    } else {
        hydro_erase
    };
    let coal_erase = if merged_erase.0.is_empty() {
        merged_erase
    } else {
        coalesce(&merged_erase, 0.5).context("coalescing erase features")?
    };

    // Chop SBBs, reassemble fragments, and soften the erase features.
    let chop = chop::chop_mod(
        &pfs_in,
        &sbbs_in,
        &coal_erase,
        params.site_search_dist,
        params.site_smth_dist,
    )?;

    // Exclusions always win: merge them back into the erase set.
    let fin_erase = if terrestrial {
        union_all(vec![chop.sub_erase.clone(), excl_clip.clone()])
    } else {
        chop.sub_erase.clone()
    };

    // PFs clipped to the retained clusters.
    let cluster_union = union_all(chop.clusters.clone());
    let pf_rtn: Vec<MultiPolygon<f64>> = pf_geoms
        .iter()
        .map(|g| clean_clip(g, &cluster_union))
        .filter(|mp| !mp.0.is_empty())
        .collect();

    // Split the ProtoSite with the erase features and cull orphan fragments.
    let ps_frags: Vec<MultiPolygon<f64>> = explode(&clean_erase(ps, &fin_erase))
        .into_iter()
        .map(MultiPolygon::from)
        .collect();
    let splits = cull_frags(ps_frags, &pf_rtn, params.search_dist);
    if splits.is_empty() {
        return Ok((Vec::new(), chop.erased_pfs));
    }

    // Rebuild a smooth boundary inside each split site.
    let mut split_bounds: Vec<MultiPolygon<f64>> = Vec::new();
    for ss in &splits {
        let sel_clusters: Vec<MultiPolygon<f64>> = chop
            .clusters
            .iter()
            .filter(|c| c.intersects(ss))
            .cloned()
            .collect();
        let sel_pfs: Vec<MultiPolygon<f64>> = pf_rtn
            .iter()
            .filter(|p| p.intersects(ss))
            .cloned()
            .collect();
        if sel_clusters.is_empty() {
            continue;
        }
        let cs_shrink = union_all(shrink_wrap(
            &sel_clusters,
            params.cluster_dist,
            params.smth_dist,
        )?);
        let site_frags: Vec<MultiPolygon<f64>> = explode(&clean_erase(&cs_shrink, &fin_erase))
            .into_iter()
            .map(MultiPolygon::from)
            .collect();
        let ss_bnd = union_all(cull_frags(site_frags, &sel_pfs, params.search_dist));
        if ss_bnd.0.is_empty() {
            continue;
        }
        split_bounds.push(coalesce(&ss_bnd, params.site_smth_dist)?);
    }

    // Dissolve to single parts; overlapping split bounds collapse here.
    let pieces: Vec<MultiPolygon<f64>> = explode(&dissolve(&split_bounds))
        .into_iter()
        .map(MultiPolygon::from)
        .collect();

    // Patch sliver gaps between split sites, then the final smoothing pass.
    let patched = patch::patch_gaps(pieces, params.site_search_dist);
    let final_clusters = shrink_wrap(&patched, 1.0, 2.5 * params.site_smth_dist)?;

    let mut out = Vec::new();
    for cluster in final_clusters {
        let bounded = if terrestrial {
            clean_erase(&cluster, &excl_clip)
        } else {
            cluster
        };
        let filled = fill_holes_pct(&bounded, 99.99);
        let finished = canonicalize(&generalize(&filled, 0.5));
        if !finished.0.is_empty() {
            out.push(finished);
        }
    }
    Ok((out, chop.erased_pfs))
}
