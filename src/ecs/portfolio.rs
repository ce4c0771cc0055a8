//! Portfolio building: select sites around ranked EOs, absorb bycatch,
//! spend remaining slots over the secondary criteria, and finalize tiers on
//! both sides of the join.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ecs::join::{join_pairs, tier_summary_text};
use crate::ecs::rank::{compute_ranks, update_slots, Order, ThreshType};
use crate::ecs::{attribute::score_bmi, PrioritizationConfig};
use crate::types::{
    ConsLand, ElementOccurrence, ElementSummary, Exclusion, RankedSite, SiteKind, TargetStatus,
    Tier,
};

/// How existing portfolio picks are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildMode {
    /// Overwrite all picks for EOs and sites.
    New,
    /// Overwrite EO picks, keep site overrides.
    NewEo,
    /// Overwrite site picks, keep EO overrides.
    NewCs,
    /// Keep overrides on both sides.
    Update,
}

/// Build the portfolio in place and finalize every derived field.
pub fn build_portfolio(
    eos: &mut Vec<ElementOccurrence>,
    sites: &mut Vec<RankedSite>,
    summary: &mut [ElementSummary],
    conslands_flat: &[ConsLand],
    cfg: &PrioritizationConfig,
) -> Result<()> {
    // Initialize picks per the build mode.
    match cfg.build {
        BuildMode::New | BuildMode::NewEo => {
            for eo in eos.iter_mut() {
                eo.portfolio = 0;
                eo.override_ = 0;
            }
        }
        _ => {
            for eo in eos.iter_mut() {
                eo.portfolio = eo.override_;
            }
        }
    }
    match cfg.build {
        BuildMode::New | BuildMode::NewCs => {
            for site in sites.iter_mut() {
                site.portfolio = 0;
                site.override_ = 0;
            }
        }
        _ => {
            for site in sites.iter_mut() {
                site.portfolio = site.override_;
            }
        }
    }

    // Site-level scores and the EO/site value exchange.
    for site in sites.iter_mut() {
        site.bmi_score = score_bmi(&site.site.geom, conslands_flat);
    }
    let pairs = join_pairs(eos, sites, cfg.slop);
    for site in sites.iter_mut() {
        site.cs_consvalue = 0;
    }
    for &(ei, si) in &pairs {
        sites[si].cs_consvalue += eos[ei].eo_consvalue;
    }
    for (ei, eo) in eos.iter_mut().enumerate() {
        let joined: Vec<usize> = pairs
            .iter()
            .filter(|&&(e, _)| e == ei)
            .map(|&(_, s)| s)
            .collect();
        eo.cs_consvalue = joined.iter().map(|&si| sites[si].cs_consvalue).max().unwrap_or(0);
        eo.cs_area_ha = joined
            .iter()
            .map(|&si| sites[si].cs_area_ha)
            .fold(0.0, f64::max);
        eo.cs_site_ids = joined
            .iter()
            .map(|&si| sites[si].site.site_id.clone())
            .collect::<Vec<_>>()
            .join("; ");
        eo.cs_site_names = joined
            .iter()
            .map(|&si| sites[si].site.site_name.clone())
            .collect::<Vec<_>>()
            .join("; ");
    }

    // Seed the portfolio without bycatch to learn the open slots, then let
    // bycatch in.
    let mut slots = update_portfolio(eos, sites, summary, cfg.slop, None, false);
    slots = update_portfolio(eos, sites, summary, cfg.slop, Some(slots), true);

    // Secondary criteria fill whatever the primary ranking left open.
    type Criterion = (
        &'static str,
        fn(&ElementOccurrence) -> f64,
        f64,
        Option<i32>,
        fn(&mut ElementOccurrence, i32),
        fn(&ElementOccurrence) -> i32,
    );
    let criteria: [Criterion; 5] = [
        ("BMI score", |eo| eo.bmi_score as f64, 5.0, None,
         |eo, r| eo.ranks.bmi = r, |eo| eo.ranks.bmi),
        ("NAP presence", |eo| eo.ysn_nap as i32 as f64, 0.5, None,
         |eo, r| eo.ranks.nap = r, |eo| eo.ranks.nap),
        ("site conservation value", |eo| eo.cs_consvalue as f64, 1.0, None,
         |eo, r| eo.ranks.cs_val = r, |eo| eo.ranks.cs_val),
        ("PF count", |eo| eo.pf_count as f64, 1.0, None,
         |eo, r| eo.ranks.num_pf = r, |eo| eo.ranks.num_pf),
        // The tiny threshold on area exists to break any remaining ties.
        ("EO size", |eo| eo.area_sqm, 0.01, Some(3),
         |eo, r| eo.ranks.eo_area = r, |eo| eo.ranks.eo_area),
    ];
    for (label, value, thresh, rounding, store, rank_of) in criteria {
        if slots.is_empty() {
            break;
        }
        info!("filling remaining slots based on {label}");
        let idxs: Vec<usize> = eos
            .iter()
            .enumerate()
            .filter(|(_, eo)| {
                eo.tier == Tier::Unassigned
                    && eo.override_ > -1
                    && eo.portfolio == 0
                    && slots.contains_key(&eo.elcode)
            })
            .map(|(i, _)| i)
            .collect();
        for (idx, rank) in compute_ranks(
            eos,
            &idxs,
            value,
            Order::Descending,
            thresh,
            ThreshType::Abs,
            rounding,
        ) {
            store(&mut eos[idx], rank);
        }
        update_slots(eos, &mut slots, rank_of);
        slots = update_portfolio(eos, sites, summary, cfg.slop, Some(slots), true);
    }

    // Capture the pre-finalization standing for the extended tier text.
    let choice_ranks: Vec<i16> = eos.iter().map(|eo| eo.tier.choice_rank()).collect();

    // Tier closure: Unassigned resolves by portfolio membership.
    for eo in eos.iter_mut() {
        if eo.tier == Tier::Unassigned && eo.is_eligible() {
            eo.tier = if eo.portfolio == 1 {
                Tier::HighPriority
            } else {
                Tier::General
            };
        }
    }
    update_portfolio(eos, sites, summary, cfg.slop, Some(slots), true);

    // Final ranks and descriptive fields on EOs.
    for (ei, eo) in eos.iter_mut().enumerate() {
        let final_rank = if eo.is_eligible() {
            eo.tier.final_rank()
        } else {
            6
        };
        eo.eeo_tier = Tier::from_final_rank(final_rank)
            .map(|t| t.to_string())
            .unwrap_or_else(|| "NA".to_string());
        eo.essential = Tier::from_final_rank(final_rank)
            .map(|t| t.essential_text().to_string())
            .unwrap_or_else(|| "NA".to_string());
        eo.ext_tier = ext_tier(eo, choice_ranks[ei]);
        if eo.override_ == -2 {
            eo.override_ = 0;
        }
    }

    // Site-side finalization from the (rebuilt) join.
    let pairs = join_pairs(eos, sites, cfg.slop);
    for (si, site) in sites.iter_mut().enumerate() {
        let min_rank = pairs
            .iter()
            .filter(|&&(_, s)| s == si)
            .map(|&(e, _)| {
                if eos[e].is_eligible() {
                    eos[e].tier.final_rank()
                } else {
                    6
                }
            })
            .min();
        site.min_final_rank = min_rank;
        site.ecs_tier = min_rank
            .and_then(Tier::from_final_rank)
            .map(|t| t.to_string())
            .unwrap_or_else(|| "NA".to_string());
        site.essential = min_rank
            .and_then(Tier::from_final_rank)
            .map(|t| t.essential_text().to_string())
            .unwrap_or_else(|| "NA".to_string());
        site.eeo_summary = tier_summary_text(si, &pairs, eos);
    }

    // Target status per element.
    for row in summary.iter_mut() {
        row.status = if row.count_elig_eo == 0 {
            TargetStatus::NotApplicable
        } else if row.portfolio > row.target {
            TargetStatus::Exceeded
        } else if row.portfolio == row.target {
            TargetStatus::Met
        } else {
            TargetStatus::NotMet
        };
    }

    // Output ordering: EOs by element and standing, sites by portfolio and
    // value.
    eos.sort_by(|a, b| {
        a.elcode
            .cmp(&b.elcode)
            .then(final_rank_of(a).cmp(&final_rank_of(b)))
            .then(a.ranks.eo.cmp(&b.ranks.eo))
            .then(a.eorank_num.cmp(&b.eorank_num))
            .then(b.portfolio.cmp(&a.portfolio))
            .then(a.eo_id.cmp(&b.eo_id))
    });
    sites.sort_by(|a, b| {
        b.portfolio
            .cmp(&a.portfolio)
            .then(a.min_final_rank.unwrap_or(i16::MAX).cmp(&b.min_final_rank.unwrap_or(i16::MAX)))
            .then(b.cs_consvalue.cmp(&a.cs_consvalue))
            .then(a.site.site_id.cmp(&b.site.site_id))
    });
    info!("portfolio build complete");
    Ok(())
}

fn final_rank_of(eo: &ElementOccurrence) -> i16 {
    if eo.is_eligible() {
        eo.tier.final_rank()
    } else {
        6
    }
}

/// One pass of the portfolio update: pull sites onto ranked EOs, then pull
/// Unassigned EOs sitting in portfolio sites (bycatch), per site type.
/// Returns the elements that still have open slots.
fn update_portfolio(
    eos: &mut [ElementOccurrence],
    sites: &mut [RankedSite],
    summary: &mut [ElementSummary],
    slop: f64,
    slot_dict: Option<BTreeMap<String, usize>>,
    bycatch: bool,
) -> BTreeMap<String, usize> {
    let pairs = join_pairs(eos, sites, slop);
    let mut kinds: Vec<SiteKind> = sites.iter().map(|s| s.site.kind).collect();
    kinds.sort();
    kinds.dedup();

    for kind in kinds {
        // Ranked or already-selected EOs pull their sites in, and land in
        // the portfolio themselves.
        let chosen: Vec<usize> = eos
            .iter()
            .enumerate()
            .filter(|(_, eo)| {
                eo.site_kinds.contains(&kind)
                    && (eo.choice_rank() <= 4 || eo.portfolio == 1)
                    && eo.override_ > -1
            })
            .map(|(i, _)| i)
            .collect();
        for &(ei, si) in &pairs {
            if chosen.contains(&ei) && sites[si].site.kind == kind && sites[si].override_ > -1 {
                sites[si].portfolio = 1;
            }
        }
        for &ei in &chosen {
            eos[ei].portfolio = 1;
        }

        if !bycatch {
            continue;
        }
        // Bycatch: Unassigned EOs inside portfolio sites of this type, but
        // only for elements with open slots.
        let mut catch: Vec<usize> = eos
            .iter()
            .enumerate()
            .filter(|(_, eo)| {
                eo.site_kinds.contains(&kind)
                    && eo.tier == Tier::Unassigned
                    && eo.portfolio == 0
                    && eo.override_ > -1
                    && slot_dict
                        .as_ref()
                        .map_or(true, |d| d.contains_key(&eo.elcode))
            })
            .map(|(i, _)| i)
            .collect();
        catch.retain(|&ei| {
            pairs.iter().any(|&(e, si)| {
                e == ei && sites[si].site.kind == kind && sites[si].portfolio == 1
            })
        });
        if let Some(dict) = &slot_dict {
            // Elements whose bycatch exceeds their open slots are dropped
            // from this run entirely.
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for &ei in &catch {
                *counts.entry(eos[ei].elcode.as_str()).or_insert(0) += 1;
            }
            let over: Vec<String> = counts
                .iter()
                .filter(|(elcode, count)| {
                    dict.get(**elcode).is_some_and(|open| *count > open)
                })
                .map(|(elcode, _)| elcode.to_string())
                .collect();
            for &ei in &catch {
                if over.contains(&eos[ei].elcode) {
                    eos[ei].override_ = -2;
                }
            }
            catch.retain(|&ei| !over.contains(&eos[ei].elcode));
        }
        for ei in catch {
            eos[ei].portfolio = 1;
            eos[ei].bycatch = true;
        }
    }

    update_status(eos, summary);
    summary
        .iter()
        .filter(|row| row.portfolio < row.target)
        .map(|row| (row.elcode.clone(), row.target - row.portfolio))
        .collect()
}

/// Refresh per-element tier counts and portfolio totals.
fn update_status(eos: &[ElementOccurrence], summary: &mut [ElementSummary]) {
    for row in summary.iter_mut() {
        let members: Vec<&ElementOccurrence> = eos
            .iter()
            .filter(|eo| eo.elcode == row.elcode && eo.override_ != -1 && eo.is_eligible())
            .collect();
        row.count_irreplaceable = members.iter().filter(|e| e.tier == Tier::Irreplaceable).count();
        row.count_critical = members.iter().filter(|e| e.tier == Tier::Critical).count();
        row.count_vital = members.iter().filter(|e| e.tier == Tier::Vital).count();
        row.count_high_priority =
            members.iter().filter(|e| e.tier == Tier::HighPriority).count();
        row.count_general = members.iter().filter(|e| e.tier == Tier::General).count();
        row.count_unassigned = members.iter().filter(|e| e.tier == Tier::Unassigned).count();
        row.portfolio = members.iter().filter(|e| e.portfolio == 1).count();
    }
}

/// The extended, human-readable tier text.
fn ext_tier(eo: &ElementOccurrence, choice_rank: i16) -> String {
    let mut text = if !eo.is_eligible() {
        match eo.exclusion {
            Exclusion::ExcludedElement | Exclusion::OldObservation => eo.exclusion.to_string(),
            _ if eo.eorank_num == 10 => "Restoration Potential".to_string(),
            _ => "Error Check Needed".to_string(),
        }
    } else {
        match eo.tier {
            Tier::Irreplaceable | Tier::Critical | Tier::Vital => eo.tier.to_string(),
            Tier::HighPriority => {
                if choice_rank == 4 {
                    format!("High Priority - Top {} EO-Rank", eo.eo_modrank)
                } else if eo.bycatch {
                    "High Priority - Bycatch Selection".to_string()
                } else {
                    "High Priority - Secondary Ranking Selection".to_string()
                }
            }
            Tier::General => {
                if choice_rank == 5 {
                    "General - Bycatch/Secondary Ranking Demotion".to_string()
                } else {
                    "General".to_string()
                }
            }
            Tier::Unassigned => "Error Check Needed".to_string(),
        }
    };
    if eo.recent < 2 {
        text.push_str(" (Update Needed)");
    }
    text
}
