//! Alignment of stream PFs to the flowline network. Features that barely
//! touch a flowline are translated so their centroid snaps onto the nearest
//! one; features already riding the network are left alone.

use anyhow::Result;
use geo::{Area, BooleanOps, Centroid, Intersects, MultiLineString, MultiPolygon, Translate};
use tracing::debug;

use crate::geom::{clean_clip, dissolve, line_length, perimeter, union_all};
use crate::stream::linework::nearest_on_line;
use crate::stream::net::FlowNet;
use crate::types::ProcFeat;

/// Share of a PF that must be open water for the wide-water (river) process.
const RIVER_PCT: f64 = 25.0;

pub(crate) struct AlignedPf {
    pub sfid: String,
    pub rule: String,
    pub geom: MultiPolygon<f64>,
}

/// Shift PFs onto the network where needed. Returns the aligned features
/// and the wide-water polygons clipped to the catchments of river-process
/// features.
pub(crate) fn shift_align_to_flow(
    pfs: &[ProcFeat],
    net: &FlowNet,
    catchments: &[MultiPolygon<f64>],
    stream_river: &[MultiPolygon<f64>],
    lake_pond: &[MultiPolygon<f64>],
) -> Result<(Vec<AlignedPf>, MultiPolygon<f64>)> {
    let widewater = {
        let mut polys = stream_river.to_vec();
        polys.extend(lake_pond.iter().cloned());
        dissolve(&polys)
    };

    // Wide-water clipped to catchments touching river-process features.
    let river_pfs: Vec<&ProcFeat> = pfs
        .iter()
        .filter(|pf| widewater_pct(&pf.geom, &widewater) >= RIVER_PCT)
        .collect();
    let river_catch: Vec<MultiPolygon<f64>> = catchments
        .iter()
        .filter(|c| river_pfs.iter().any(|pf| pf.geom.intersects(*c)))
        .cloned()
        .collect();
    let clip_widewater = if river_catch.is_empty() {
        MultiPolygon(vec![])
    } else {
        clean_clip(&widewater, &union_all(river_catch))
    };

    let mut aligned = Vec::with_capacity(pfs.len());
    for pf in pfs {
        let river = widewater_pct(&pf.geom, &widewater) >= RIVER_PCT;

        // Flowline intersections with the PF: many or long means the
        // feature is already well aligned.
        let mut pieces = 0usize;
        let mut cut_length = 0.0;
        for line in net.lines() {
            let mls = MultiLineString(vec![line.geom.clone()]);
            let clipped = pf.geom.clip(&mls, false);
            pieces += clipped.0.len();
            cut_length += clipped.0.iter().map(line_length).sum::<f64>();
        }
        let well_aligned = pieces >= 3 || cut_length >= perimeter(&pf.geom) / 4.0;
        if well_aligned || net.lines().is_empty() {
            aligned.push(AlignedPf {
                sfid: pf.sfid.clone(),
                rule: pf.rule.clone(),
                geom: pf.geom.clone(),
            });
            continue;
        }

        // Snap the centroid to the nearest flowline of the process type.
        let Some(centroid) = pf.geom.centroid() else {
            continue;
        };
        let mut best: Option<(f64, geo::Coord<f64>)> = None;
        for line in net.lines() {
            // River-process features snap only to lines in wide water.
            if river && !clip_widewater.0.is_empty() && !line.geom.intersects(&clip_widewater) {
                continue;
            }
            let (dist, _, at) = nearest_on_line(&line.geom, centroid);
            if best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, at));
            }
        }
        let geom = match best {
            Some((dist, target)) if dist > 0.0 => {
                debug!(sfid = %pf.sfid, dist, "shifting PF onto flowline");
                pf.geom
                    .translate(target.x - centroid.x(), target.y - centroid.y())
            }
            _ => pf.geom.clone(),
        };
        aligned.push(AlignedPf {
            sfid: pf.sfid.clone(),
            rule: pf.rule.clone(),
            geom,
        });
    }
    Ok((aligned, clip_widewater))
}

fn widewater_pct(geom: &MultiPolygon<f64>, widewater: &MultiPolygon<f64>) -> f64 {
    let total = geom.unsigned_area();
    if total <= 0.0 || widewater.0.is_empty() {
        return 0.0;
    }
    100.0 * clean_clip(geom, widewater).unsigned_area() / total
}
