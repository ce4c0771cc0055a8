//! From traced SCS lines to site polygons.

use anyhow::Result;
use geo::{Intersects, LineString, MultiPolygon};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::geom::{
    buffer, buffer_lines, clean_clip, dissolve, explode, fill_holes_area, fill_holes_pct,
    smooth_paek, union_all,
};
use crate::stream::align::shift_align_to_flow;
use crate::stream::net::{Barrier, FlowNet};
use crate::stream::trace::{create_scs_lines, make_network_points};
use crate::stream::StreamConfig;
use crate::types::{NwiFeat, ProcFeat, Site, SiteKind};
use crate::workspace::Workspace;

/// Inputs of the stream delineator. PFs are the SCS-worthy subset (rules
/// `SCS1`/`SCS2`); hydrography arrives pre-filtered into wide-water stream
/// polygons and lake/pond polygons.
pub struct StreamInputs {
    pub pfs: Vec<ProcFeat>,
    pub net: FlowNet,
    pub dams: Vec<Barrier>,
    pub catchments: Vec<MultiPolygon<f64>>,
    pub stream_river: Vec<MultiPolygon<f64>>,
    pub lake_pond: Vec<MultiPolygon<f64>>,
    pub nwi: Vec<NwiFeat>,
    /// Flow-distance masks (from the raster side), consumed as opaque
    /// polygons; when absent the clipping buffer itself bounds the site.
    pub flow_buffers: Option<Vec<MultiPolygon<f64>>>,
}

#[derive(Clone, Debug, Default)]
pub struct StreamReport {
    /// Line groups whose buffering failed.
    pub failed_groups: Vec<(usize, String)>,
    /// Number of unsplit SCS line groups traced.
    pub group_count: usize,
}

/// Delineate Stream Conservation Sites.
pub fn delineate_stream_sites(
    inputs: &StreamInputs,
    cfg: &StreamConfig,
    ws: &Workspace,
) -> Result<(Vec<Site>, StreamReport)> {
    anyhow::ensure!(!inputs.pfs.is_empty(), "no stream PFs to process");

    let (aligned, _widewater) = shift_align_to_flow(
        &inputs.pfs,
        &inputs.net,
        &inputs.catchments,
        &inputs.stream_river,
        &inputs.lake_pond,
    )?;
    let points = make_network_points(&aligned, &inputs.net, &inputs.nwi);
    let groups = create_scs_lines(&points, &inputs.net, &inputs.dams, cfg)?;
    let mut report = StreamReport {
        group_count: groups.len(),
        ..Default::default()
    };
    info!(groups = groups.len(), "SCS line groups traced");

    // Small working buffers smooth only raster-derived catchment edges.
    let scu = cfg.buff_dist < 150.0 && cfg.trim;

    let mut polys: Vec<MultiPolygon<f64>> = if cfg.trim {
        let results: Vec<(usize, Result<MultiPolygon<f64>>)> = groups
            .par_iter()
            .enumerate()
            .map(|(idx, group)| (idx, buffer_group(group, inputs, cfg, scu)))
            .collect();
        let mut polys = Vec::new();
        for (idx, result) in results {
            match result {
                Ok(mp) if !mp.0.is_empty() => polys.push(mp),
                Ok(_) => {}
                Err(err) => {
                    warn!(group = idx, %err, "buffering failed for line group");
                    report.failed_groups.push((idx, format!("{err:#}")));
                }
            }
        }
        polys
    } else {
        // Untrimmed: whole catchments intersecting the lines.
        inputs
            .catchments
            .iter()
            .filter(|c| groups.iter().flatten().any(|seg| c.intersects(seg)))
            .cloned()
            .collect()
    };

    // Alternate process: PFs flagged SCS2 take their entire catchments.
    let alt_pfs: Vec<&ProcFeat> = inputs
        .pfs
        .iter()
        .filter(|pf| pf.rule.trim() == "SCS2")
        .collect();
    if !alt_pfs.is_empty() {
        let full: Vec<MultiPolygon<f64>> = inputs
            .catchments
            .iter()
            .filter(|c| alt_pfs.iter().any(|pf| pf.geom.intersects(*c)))
            .cloned()
            .collect();
        if !full.is_empty() {
            info!(count = full.len(), "appending full catchments for SCS2 features");
            let merged = dissolve(&full);
            polys.push(if scu {
                smooth_paek(&merged, 50.0)
            } else {
                merged
            });
        }
    }

    // Dissolve adjacent pieces, smooth, and keep polygons on the traces.
    let merged = dissolve(&polys);
    let smoothed = if scu { merged } else { smooth_paek(&merged, 50.0) };
    let kept: Vec<MultiPolygon<f64>> = explode(&smoothed)
        .into_iter()
        .map(MultiPolygon::from)
        .filter(|poly| groups.iter().flatten().any(|seg| poly.intersects(seg)))
        // Contained holes under a hectare are artifacts of the buffering.
        .map(|poly| fill_holes_area(&poly, 10_000.0))
        .collect();

    let sites: Vec<Site> = kept
        .into_iter()
        .enumerate()
        .map(|(idx, geom)| Site {
            site_id: format!("SCS-{:04}", idx + 1),
            site_name: String::new(),
            kind: SiteKind::Scs,
            brank: None,
            geom,
        })
        .collect();
    info!(sites = sites.len(), "stream site delineation complete");
    ws.dump(
        "scs_sites",
        &sites.iter().map(|s| s.geom.clone()).collect::<Vec<_>>(),
    );
    Ok((sites, report))
}

/// Buffer one line group: the lines and their intersecting wide-water
/// polygons, bounded by the catchments the group runs through.
fn buffer_group(
    group: &[LineString<f64>],
    inputs: &StreamInputs,
    cfg: &StreamConfig,
    scu: bool,
) -> Result<MultiPolygon<f64>> {
    let catch: Vec<MultiPolygon<f64>> = inputs
        .catchments
        .iter()
        .filter(|c| group.iter().any(|seg| c.intersects(seg)))
        .cloned()
        .collect();
    if catch.is_empty() {
        return Ok(MultiPolygon(vec![]));
    }
    let diss_catch = dissolve(&catch);

    // Wide-water polygons on the trace, clipped to the catchments, holes
    // filled to avoid aberrant islands.
    let water_sel: Vec<MultiPolygon<f64>> = inputs
        .stream_river
        .iter()
        .chain(inputs.lake_pond.iter())
        .filter(|w| group.iter().any(|seg| w.intersects(seg)))
        .map(|w| fill_holes_pct(&clean_clip(w, &diss_catch), 99.0))
        .filter(|w| !w.0.is_empty())
        .collect();

    let mut pieces = vec![buffer_lines(group, cfg.buff_dist)];
    for water in &water_sel {
        pieces.push(buffer(water, cfg.buff_dist));
    }
    let clip_buff = clean_clip(&union_all(pieces), &diss_catch);

    // Flow-distance masks further restrict the footprint when present.
    let mut poly = match &inputs.flow_buffers {
        Some(masks) => clean_clip(&dissolve(masks), &clip_buff),
        None => clip_buff,
    };
    if scu {
        // Dangling crumbs appear where masks and catchments disagree.
        poly = MultiPolygon(
            explode(&poly)
                .into_iter()
                .filter(|p| geo::Area::unsigned_area(p) >= 500.0)
                .collect(),
        );
    }
    Ok(poly)
}
