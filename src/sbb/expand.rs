//! SBB expansion into habitat cores: PFs sitting inside a core earn their
//! SBB a core-clipped extra buffer.

use anyhow::Result;
use geo::{Intersects, MultiPolygon};
use tracing::info;

use crate::geom::{buffer, clean_clip, cull_frags, explode, smooth_paek, union_all};
use crate::types::{ProcFeat, Rule, Sbb};
use crate::workspace::Workspace;

const CORE_BUFF: f64 = 1000.0;
const SMOOTH_DIST: f64 = 120.0;

/// Expand SBBs with core area, then smooth every SBB.
///
/// For each core intersecting at least one PF of interest (rules other than
/// AHZ and 1), the SBBs of those PFs are buffered by 1000 m, clipped to the
/// core, stripped of fragments that touch no PF, and unioned back onto the
/// original SBB. Expansions from multiple cores are additive.
pub fn expand_sbbs(
    cores: &[MultiPolygon<f64>],
    sbbs: &[Sbb],
    pfs: &[ProcFeat],
    ws: &Workspace,
) -> Result<Vec<Sbb>> {
    let mut extras: Vec<Vec<MultiPolygon<f64>>> = vec![Vec::new(); sbbs.len()];

    let mut num_cores = 0;
    for core in cores {
        // PFs of interest centered in this core.
        let core_pfs: Vec<&ProcFeat> = pfs
            .iter()
            .filter(|pf| !matches!(pf.rule(), Rule::Ahz | Rule::Numbered(1)))
            .filter(|pf| pf.geom.intersects(core))
            .collect();
        if core_pfs.is_empty() {
            continue;
        }
        num_cores += 1;

        let pf_geoms: Vec<MultiPolygon<f64>> =
            core_pfs.iter().map(|pf| pf.geom.clone()).collect();
        for (idx, sbb) in sbbs.iter().enumerate() {
            if !core_pfs.iter().any(|pf| pf.sfid == sbb.sfid) {
                continue;
            }
            let grown = buffer(&sbb.geom, CORE_BUFF);
            let clipped = clean_clip(&grown, core);
            let frags = explode(&clipped)
                .into_iter()
                .map(MultiPolygon::from)
                .collect();
            let kept = cull_frags(frags, &pf_geoms, 0.0);
            if !kept.is_empty() {
                extras[idx].push(union_all(kept));
            }
        }
    }
    info!(cores = num_cores, "processed cores with resident PFs");

    let expanded: Vec<Sbb> = sbbs
        .iter()
        .zip(extras)
        .map(|(sbb, extra)| {
            let geom = if extra.is_empty() {
                sbb.geom.clone()
            } else {
                let mut pieces = vec![sbb.geom.clone()];
                pieces.extend(extra);
                union_all(pieces)
            };
            Sbb {
                sfid: sbb.sfid.clone(),
                rule: sbb.rule,
                buffer: sbb.buffer,
                geom: smooth_paek(&geom, SMOOTH_DIST),
            }
        })
        .collect();

    ws.dump(
        "sbb_expanded",
        &expanded.iter().map(|s| s.geom.clone()).collect::<Vec<_>>(),
    );
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use geo::{Area, Contains, Coord, LineString, Polygon};

    use super::*;

    fn rect(x0: f64, y0: f64, w: f64, h: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString(vec![
                Coord { x: x0, y: y0 },
                Coord { x: x0 + w, y: y0 },
                Coord { x: x0 + w, y: y0 + h },
                Coord { x: x0, y: y0 + h },
                Coord { x: x0, y: y0 },
            ]),
            vec![],
        )])
    }

    fn pf(sfid: &str, rule: &str, geom: MultiPolygon<f64>) -> ProcFeat {
        ProcFeat {
            sfid: sfid.to_string(),
            eo_id: 1,
            elcode: "ABCDE12345".to_string(),
            sname: String::new(),
            rule: rule.to_string(),
            buffer: None,
            eorank: String::new(),
            grank: String::new(),
            srank: String::new(),
            rnd_grank: String::new(),
            eolastobs: String::new(),
            fedstat: String::new(),
            sprot: String::new(),
            geom,
        }
    }

    #[test]
    fn sbb_inside_core_gains_core_area() {
        let ws = Workspace::in_memory(None);
        let core = rect(-2000.0, -2000.0, 4000.0, 4000.0);
        let pf_geom = rect(0.0, 0.0, 100.0, 100.0);
        let sbb = Sbb {
            sfid: "a".to_string(),
            rule: Rule::Numbered(2),
            buffer: Some(250.0),
            geom: buffer(&pf_geom, 250.0),
        };
        let pfs = vec![pf("a", "2", pf_geom)];
        let out = expand_sbbs(std::slice::from_ref(&core), &[sbb.clone()], &pfs, &ws).unwrap();
        assert_eq!(out.len(), 1);
        // The expansion adds core area beyond the plain 250 m buffer.
        assert!(out[0].geom.unsigned_area() > sbb.geom.unsigned_area());
        assert!(out[0].geom.contains(&Coord { x: 1000.0, y: 50.0 }));
        // Clipped to the core.
        assert!(!out[0].geom.contains(&Coord { x: 2500.0, y: 50.0 }));
    }

    #[test]
    fn rule_one_and_ahz_pfs_do_not_expand() {
        let ws = Workspace::in_memory(None);
        let core = rect(-2000.0, -2000.0, 4000.0, 4000.0);
        let pf_geom = rect(0.0, 0.0, 100.0, 100.0);
        let sbb = Sbb {
            sfid: "a".to_string(),
            rule: Rule::Numbered(1),
            buffer: Some(150.0),
            geom: buffer(&pf_geom, 150.0),
        };
        let pfs = vec![pf("a", "1", pf_geom)];
        let out = expand_sbbs(std::slice::from_ref(&core), &[sbb.clone()], &pfs, &ws).unwrap();
        // Smoothing only; no 1000 m expansion.
        assert!(!out[0].geom.contains(&Coord { x: 1000.0, y: 50.0 }));
    }

    #[test]
    fn pf_outside_every_core_is_untouched() {
        let ws = Workspace::in_memory(None);
        let core = rect(5000.0, 5000.0, 100.0, 100.0);
        let pf_geom = rect(0.0, 0.0, 100.0, 100.0);
        let sbb = Sbb {
            sfid: "a".to_string(),
            rule: Rule::Numbered(2),
            buffer: Some(250.0),
            geom: buffer(&pf_geom, 250.0),
        };
        let pfs = vec![pf("a", "2", pf_geom)];
        let out = expand_sbbs(std::slice::from_ref(&core), &[sbb.clone()], &pfs, &ws).unwrap();
        let ratio = out[0].geom.unsigned_area() / sbb.geom.unsigned_area();
        assert!(ratio > 0.95 && ratio <= 1.001);
    }
}
