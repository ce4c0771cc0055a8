//! EO attribution: dissolve Procedural Features into element occurrences,
//! attach viability and protection attributes, and seed the element summary.

use std::collections::BTreeMap;

use anyhow::Result;
use geo::{Area, Intersects, MultiPolygon};
use tracing::{info, warn};

use crate::ecs::rank::{compute_ranks, mod_ranks, Order, ThreshType};
use crate::ecs::PrioritizationReport;
use crate::geom::{clean_clip, clean_erase, dissolve, union_all};
use crate::types::{
    ConsLand, EcoRegion, ElementExclusion, ElementOccurrence, ElementSummary, EoRanks, Exclusion,
    ProcFeat, SiteKind, TargetStatus, Tier,
};

/// Managed-area types counted as military land.
const MILITARY_MATYPES: [&str; 5] = [
    "Military Installation",
    "Military Recreation Area",
    "NASA Facility",
    "sold - Military Installation",
    "surplus - Military Installation",
];

const NAP_MATYPE: &str = "State Natural Area Preserve";

/// Map the EO-rank text onto its ordinal (A best = 1 .. D = 10; anything
/// unrankable = 11).
fn eorank_num(eorank: &str) -> i16 {
    match eorank.trim() {
        "A" => 1,
        "A?" => 2,
        "AB" => 3,
        "AC" | "B" => 4,
        "B?" => 5,
        "BC" => 6,
        "C" => 7,
        "C?" | "E" => 8,
        "CD" => 9,
        "D" | "D?" => 10,
        _ => 11,
    }
}

/// Normalize the rounded G-rank: T-ranks fold onto G-ranks and everything
/// unrankable defaults to G5.
fn new_grank(rnd_grank: &str) -> String {
    match rnd_grank.trim() {
        "T1" => "G1".to_string(),
        "T2" => "G2".to_string(),
        "T3" => "G3".to_string(),
        "T4" => "G4".to_string(),
        "T5" | "GH" | "GNA" | "GNR" | "GU" | "TNR" | "TX" | "" => "G5".to_string(),
        other => other.to_string(),
    }
}

fn obs_year(eolastobs: &str) -> i32 {
    eolastobs.trim().get(0..4).and_then(|y| y.parse().ok()).unwrap_or(0)
}

/// Percent of `geom` covered by the dissolved `cover` polygons.
fn percent_cover(geom: &MultiPolygon<f64>, cover: &MultiPolygon<f64>) -> f64 {
    let total = geom.unsigned_area();
    if total <= 0.0 || cover.0.is_empty() {
        return 0.0;
    }
    100.0 * clean_clip(geom, cover).unsigned_area() / total
}

/// BMI-weighted protection score: percent coverage by BMI classes 1..4
/// weighted 1.00 / 0.75 / 0.50 / 0.25 and rounded.
pub fn score_bmi(geom: &MultiPolygon<f64>, conslands_flat: &[ConsLand]) -> i32 {
    let mut score = 0.0;
    for (class, weight) in [("1", 1.0), ("2", 0.75), ("3", 0.5), ("4", 0.25)] {
        let class_geoms: Vec<MultiPolygon<f64>> = conslands_flat
            .iter()
            .filter(|c| c.bmi == class)
            .map(|c| c.geom.clone())
            .collect();
        if class_geoms.is_empty() {
            continue;
        }
        score += weight * percent_cover(geom, &dissolve(&class_geoms));
    }
    score.round() as i32
}

/// Flatten overlapping conservation lands so the best (lowest) BMI class
/// wins everywhere. The real managed-area layer overlaps freely; percentage
/// tabulations need a flat one.
pub fn flatten_conslands(conslands: &[ConsLand]) -> Vec<ConsLand> {
    let mut covered = MultiPolygon(vec![]);
    let mut flat = Vec::new();
    for class in ["1", "2", "3", "4", "5", "U"] {
        let geoms: Vec<MultiPolygon<f64>> = conslands
            .iter()
            .filter(|c| c.bmi == class)
            .map(|c| c.geom.clone())
            .collect();
        if geoms.is_empty() {
            continue;
        }
        let merged = dissolve(&geoms);
        let remainder = clean_erase(&merged, &covered);
        covered = union_all(vec![covered, merged]);
        if !remainder.0.is_empty() {
            flat.push(ConsLand {
                bmi: class.to_string(),
                matype: String::new(),
                geom: remainder,
            });
        }
    }
    flat
}

/// Dissolve PFs to EOs and compute every attribute the ranker consumes.
/// Also emits the per-element summary rows and validates the exclusions
/// table.
pub fn attribute_eos(
    pfs: &[ProcFeat],
    exclusions: &[ElementExclusion],
    conslands: &[ConsLand],
    conslands_flat: &[ConsLand],
    ecoregions: &[EcoRegion],
    cut_flag_years: &[(SiteKind, i32, i32)],
) -> Result<(Vec<ElementOccurrence>, Vec<ElementSummary>, PrioritizationReport)> {
    let mut report = PrioritizationReport::default();

    // Validate the exclusions table: ELCODEs are 10 characters, not null.
    let mut excluded_elcodes: Vec<&str> = Vec::new();
    for row in exclusions {
        match &row.elcode {
            Some(elcode) if elcode.len() == 10 => {
                if row.exclude {
                    excluded_elcodes.push(elcode);
                }
            }
            Some(elcode) => {
                warn!(%elcode, "exclusion ELCODE is not 10 characters");
                report
                    .exclusion_warnings
                    .push(format!("ELCODE not 10 characters: {elcode}"));
                if row.exclude {
                    excluded_elcodes.push(elcode);
                }
            }
            None => {
                warn!("exclusion row with null ELCODE");
                report.exclusion_warnings.push("null ELCODE".to_string());
            }
        }
    }

    let military = dissolve(
        &conslands
            .iter()
            .filter(|c| MILITARY_MATYPES.contains(&c.matype.as_str()))
            .map(|c| c.geom.clone())
            .collect::<Vec<_>>(),
    );
    let naps: Vec<&ConsLand> = conslands
        .iter()
        .filter(|c| c.matype == NAP_MATYPE)
        .collect();

    // Dissolve PFs on SF_EOID; BTreeMap keeps element/EO order stable.
    let mut grouped: BTreeMap<i64, Vec<&ProcFeat>> = BTreeMap::new();
    for pf in pfs {
        grouped.entry(pf.eo_id).or_default().push(pf);
    }
    info!(eos = grouped.len(), "dissolving procedural features by EO");

    let mut eos: Vec<ElementOccurrence> = Vec::with_capacity(grouped.len());
    for (eo_id, members) in grouped {
        let first = members[0];
        let geom = dissolve(&members.iter().map(|pf| pf.geom.clone()).collect::<Vec<_>>());
        let site_kinds = SiteKind::from_rules(members.iter().map(|pf| pf.rule.as_str()));

        let year = members.iter().map(|pf| obs_year(&pf.eolastobs)).max().unwrap_or(0);
        // Every matching cut/flag entry overwrites: last match in list
        // order wins.
        let mut recent = 2;
        for (kind, cut, flag) in cut_flag_years {
            if !site_kinds.contains(kind) {
                continue;
            }
            recent = if year <= *cut {
                0
            } else if year <= *flag {
                1
            } else {
                2
            };
        }

        let rank_num = eorank_num(&first.eorank);
        let mut exclusion = match rank_num {
            10 => Exclusion::NotViable,
            n if n > 10 => Exclusion::ErrorCheckNeeded,
            _ => Exclusion::Keep,
        };
        if recent == 0 {
            exclusion = Exclusion::OldObservation;
        }
        if excluded_elcodes.contains(&first.elcode.as_str()) {
            exclusion = Exclusion::ExcludedElement;
        }

        let mut eco_hits: Vec<(String, f64)> = ecoregions
            .iter()
            .map(|region| (region.code.clone(), percent_cover(&geom, &region.geom)))
            .filter(|(_, pct)| *pct > 0.0)
            .collect();
        eco_hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let gen_reg = eco_hits.first().map(|(code, _)| code.clone());

        let area_sqm = geom.unsigned_area();
        eos.push(ElementOccurrence {
            eo_id,
            elcode: first.elcode.clone(),
            sname: first.sname.clone(),
            eorank: first.eorank.clone(),
            eorank_num: rank_num,
            new_grank: new_grank(&first.rnd_grank),
            obs_year: year,
            recent,
            exclusion,
            site_kinds,
            pf_count: members.len(),
            percent_mil: (percent_cover(&geom, &military) * 100.0).round() / 100.0,
            bmi_score: score_bmi(&geom, conslands_flat),
            ysn_nap: naps.iter().any(|nap| geom.intersects(&nap.geom)),
            ecoregions: eco_hits.iter().map(|(code, _)| code.clone()).collect(),
            gen_reg,
            eo_modrank: 0,
            tier: Tier::Unassigned,
            ranks: EoRanks::default(),
            eo_consvalue: 0,
            cs_consvalue: 0,
            cs_area_ha: 0.0,
            cs_site_ids: String::new(),
            cs_site_names: String::new(),
            portfolio: 0,
            override_: 0,
            bycatch: false,
            ext_tier: String::new(),
            eeo_tier: String::new(),
            essential: String::new(),
            area_sqm,
            geom,
        });
    }

    // Modified competition rank of EO-rank, over eligible EOs.
    let eligible: Vec<usize> = eos
        .iter()
        .enumerate()
        .filter(|(_, eo)| eo.is_eligible())
        .map(|(i, _)| i)
        .collect();
    let dense = compute_ranks(
        &eos,
        &eligible,
        |eo| eo.eorank_num as f64,
        Order::Ascending,
        0.5,
        ThreshType::Abs,
        None,
    );
    for (idx, modrank) in mod_ranks(&dense, &eos) {
        eos[idx].eo_modrank = modrank;
    }

    // Element summary rows; eligible EOs inherit the initial tier.
    let mut elcodes: Vec<&str> = eos.iter().map(|eo| eo.elcode.as_str()).collect();
    elcodes.sort_unstable();
    elcodes.dedup();
    let mut summary = Vec::with_capacity(elcodes.len());
    for elcode in elcodes {
        let members: Vec<&ElementOccurrence> =
            eos.iter().filter(|eo| eo.elcode == elcode).collect();
        let elig: Vec<&&ElementOccurrence> =
            members.iter().filter(|eo| eo.is_eligible()).collect();
        let grank = members
            .iter()
            .find(|eo| eo.is_eligible())
            .unwrap_or(&members[0])
            .new_grank
            .clone();

        let mut regions: Vec<&str> = elig
            .iter()
            .flat_map(|eo| eo.ecoregions.iter().map(String::as_str))
            .collect();
        regions.sort_unstable();
        regions.dedup();

        let mut bmi_sorted: Vec<i32> = elig.iter().map(|eo| eo.bmi_score).collect();
        bmi_sorted.sort_unstable_by(|a, b| b.cmp(a));
        let bmi_at_rank = [1usize, 2, 3, 5, 10]
            .map(|n| bmi_sorted.get(n - 1).copied().unwrap_or(0));
        let mean_bmi = if elig.is_empty() {
            0.0
        } else {
            bmi_sorted.iter().sum::<i32>() as f64 / elig.len() as f64
        };

        let target = ElementSummary::target_for(&grank, elig.len());
        summary.push(ElementSummary {
            elcode: elcode.to_string(),
            sname: members[0].sname.clone(),
            new_grank: grank,
            count_all_eo: members.len(),
            count_inelig_eo: members.len() - elig.len(),
            count_elig_eo: elig.len(),
            excluded: excluded_elcodes.contains(&elcode),
            num_reg: regions.len(),
            target,
            init_tier: ElementSummary::initial_tier(elig.len()),
            mean_bmi,
            bmi_at_rank,
            count_irreplaceable: 0,
            count_critical: 0,
            count_vital: 0,
            count_high_priority: 0,
            count_general: 0,
            count_unassigned: 0,
            portfolio: 0,
            status: TargetStatus::NotApplicable,
        });
    }
    for summary_row in &summary {
        for eo in eos.iter_mut() {
            if eo.elcode == summary_row.elcode && eo.is_eligible() {
                eo.tier = summary_row.init_tier;
            }
        }
    }

    info!(elements = summary.len(), "EO attribution complete");
    Ok((eos, summary, report))
}
