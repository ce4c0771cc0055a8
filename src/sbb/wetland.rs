//! Wetland SBBs (rules 5, 6, 7 and 9): the PF's minimum buffer merged with
//! the cluster of NWI wetlands reachable from it, clamped to the maximum
//! buffer.

use anyhow::{bail, Result};
use geo::{BoundingRect, Intersects, MultiPolygon};
use rstar::{RTree, AABB};

use crate::geom::{
    buffer, clean_clip, cluster_within, dissolve, mp_distance, union_all, IndexedBounds,
};
use crate::types::{NwiFeat, ProcFeat, Rule};

const MIN_BUFF: f64 = 250.0;
const MAX_BUFF: f64 = 500.0;
const NWI_BUFF: f64 = 100.0;
const SEARCH_DIST: f64 = 15.0;

/// NWI wetlands split by rule membership, each subset behind an R-tree.
pub(super) struct NwiIndex {
    subsets: [(u8, Vec<MultiPolygon<f64>>, RTree<IndexedBounds>); 4],
}

impl NwiIndex {
    pub(super) fn new(nwi: &[NwiFeat]) -> Self {
        let build = |rule: u8| {
            let geoms: Vec<MultiPolygon<f64>> = nwi
                .iter()
                .filter(|n| n.matches_rule(rule))
                .map(|n| n.geom.clone())
                .collect();
            let tree = RTree::bulk_load(IndexedBounds::from_geoms(&geoms));
            (rule, geoms, tree)
        };
        Self {
            subsets: [build(5), build(6), build(7), build(9)],
        }
    }

    fn subset(&self, rule: u8) -> Option<(&[MultiPolygon<f64>], &RTree<IndexedBounds>)> {
        self.subsets
            .iter()
            .find(|(r, _, _)| *r == rule)
            .map(|(_, geoms, tree)| (geoms.as_slice(), tree))
    }
}

/// Build the wetland SBB for one PF.
pub(super) fn wetland_sbb(pf: &ProcFeat, index: &NwiIndex) -> Result<MultiPolygon<f64>> {
    let Rule::Numbered(rule) = pf.rule() else {
        bail!("not a wetland rule: {}", pf.rule);
    };
    let Some((geoms, tree)) = index.subset(rule) else {
        bail!("not a wetland rule: {rule}");
    };

    // A zero-buffer override collapses both envelopes one step inward.
    let override_zero = pf.buffer == Some(0.0);
    let b_min = if override_zero {
        pf.geom.clone()
    } else {
        buffer(&pf.geom, MIN_BUFF)
    };
    let b_max = buffer(&pf.geom, if override_zero { MIN_BUFF } else { MAX_BUFF });

    // Candidate wetlands: those reaching the maximum envelope, clipped to it.
    let Some(rect) = b_max.bounding_rect() else {
        bail!("PF {} has empty geometry", pf.sfid);
    };
    let search = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
    let clipped: Vec<MultiPolygon<f64>> = tree
        .locate_in_envelope_intersecting(&search)
        .filter(|entry| geoms[entry.idx].intersects(&b_max))
        .map(|entry| clean_clip(&geoms[entry.idx], &b_max))
        .filter(|mp| !mp.0.is_empty())
        .collect();
    if clipped.is_empty() {
        return Ok(b_min);
    }

    // Seed with wetlands within reach of the PF itself, then take the whole
    // proximity cluster each seed belongs to (the fixpoint of iterative
    // selection expansion).
    let seeds: Vec<usize> = clipped
        .iter()
        .enumerate()
        .filter(|(_, w)| mp_distance(w, &pf.geom) <= SEARCH_DIST)
        .map(|(i, _)| i)
        .collect();
    if seeds.is_empty() {
        return Ok(b_min);
    }
    let clusters = cluster_within(&clipped, SEARCH_DIST);
    let selected: Vec<MultiPolygon<f64>> = clusters
        .into_iter()
        .filter(|members| members.iter().any(|m| seeds.contains(m)))
        .flat_map(|members| members.into_iter().map(|m| clipped[m].clone()))
        .collect();

    let nwi_buffered = buffer(&dissolve(&selected), NWI_BUFF);
    let merged = union_all(vec![b_min, nwi_buffered]);
    Ok(clean_clip(&merged, &b_max))
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

    fn pf_rule(rule: &str, buffer: Option<f64>) -> ProcFeat {
        ProcFeat {
            sfid: "w1".to_string(),
            eo_id: 9,
            elcode: "ABCDE12345".to_string(),
            sname: String::new(),
            rule: rule.to_string(),
            buffer,
            eorank: String::new(),
            grank: String::new(),
            srank: String::new(),
            rnd_grank: String::new(),
            eolastobs: String::new(),
            fedstat: String::new(),
            sprot: String::new(),
            geom: rect(0.0, 0.0, 100.0, 100.0),
        }
    }

    fn nwi(rule: u8, geom: MultiPolygon<f64>) -> NwiFeat {
        NwiFeat {
            attribute: "PFO1A".to_string(),
            rule5: rule == 5,
            rule6: rule == 6,
            rule7: rule == 7,
            rule9: rule == 9,
            tidal: false,
            geom,
        }
    }

    #[test]
    fn nearby_wetland_extends_the_sbb() {
        // Wetland 10 m east of the PF, stretching 600 m away; the SBB picks
        // it up but stays clamped to the 500 m envelope.
        let wetland = nwi(9, rect(110.0, 40.0, 600.0, 20.0));
        let index = NwiIndex::new(std::slice::from_ref(&wetland));
        let pf = pf_rule("9", None);
        let sbb = wetland_sbb(&pf, &index).unwrap();

        // Covers the wetland near the PF (plus its 100 m halo)...
        assert!(sbb.contains(&Coord { x: 300.0, y: 50.0 }));
        assert!(sbb.contains(&Coord { x: 300.0, y: 140.0 }));
        // ...but nothing beyond the max buffer.
        let b_max = buffer(&pf.geom, 500.0);
        for poly in &sbb.0 {
            assert!(b_max.intersects(poly));
        }
        assert!(!sbb.contains(&Coord { x: 620.0, y: 50.0 }));
    }

    #[test]
    fn far_wetland_is_ignored() {
        // Inside the envelope but 200 m from the PF: not selected, SBB is
        // the plain 250 m buffer.
        let wetland = nwi(5, rect(300.0, 0.0, 50.0, 50.0));
        let index = NwiIndex::new(std::slice::from_ref(&wetland));
        let pf = pf_rule("5", None);
        let sbb = wetland_sbb(&pf, &index).unwrap();
        let plain = buffer(&pf.geom, 250.0);
        assert!((sbb.unsigned_area() - plain.unsigned_area()).abs() < 1.0);
    }

    #[test]
    fn chained_wetlands_join_through_the_fixpoint() {
        // First wetland 10 m from the PF, second 10 m from the first:
        // both are selected through cluster expansion.
        let w1 = nwi(6, rect(110.0, 40.0, 50.0, 20.0));
        let w2 = nwi(6, rect(170.0, 40.0, 50.0, 20.0));
        let index = NwiIndex::new(&[w1, w2]);
        let pf = pf_rule("6", None);
        let sbb = wetland_sbb(&pf, &index).unwrap();
        assert!(sbb.contains(&Coord { x: 210.0, y: 50.0 }));
    }

    #[test]
    fn rule_mismatch_subset_is_empty() {
        // A rule-5 wetland adjacent to a rule-9 PF contributes nothing.
        let wetland = nwi(5, rect(110.0, 40.0, 50.0, 20.0));
        let index = NwiIndex::new(std::slice::from_ref(&wetland));
        let pf = pf_rule("9", None);
        let sbb = wetland_sbb(&pf, &index).unwrap();
        let plain = buffer(&pf.geom, 250.0);
        assert!((sbb.unsigned_area() - plain.unsigned_area()).abs() < 1.0);
    }

    #[test]
    fn zero_override_shrinks_both_envelopes() {
        let index = NwiIndex::new(&[]);
        let pf = pf_rule("5", Some(0.0));
        let sbb = wetland_sbb(&pf, &index).unwrap();
        // No NWI in range: the SBB is the PF itself.
        assert!((sbb.unsigned_area() - 10_000.0).abs() < 1e-6);
    }
}
