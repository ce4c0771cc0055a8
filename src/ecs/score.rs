//! Within-element EO scoring: the ordered ranking criteria, the Vital
//! selection, and the conservation-value matrix.

use std::collections::BTreeMap;

use tracing::info;

use crate::ecs::rank::{compute_ranks, update_tiers, Order, ThreshType};
use crate::types::{ElementOccurrence, ElementSummary, Tier};

/// Conservation value of an EO from its tier and normalized G-rank.
fn cons_value(tier: Tier, grank: &str) -> i32 {
    let column = match grank {
        "G1" => 0,
        "G2" => 1,
        "G3" => 2,
        "G4" => 3,
        _ => 4,
    };
    let row = match tier {
        Tier::Irreplaceable => [100, 95, 85, 75, 70],
        Tier::Critical => [95, 90, 80, 70, 65],
        Tier::Vital => [80, 75, 65, 55, 50],
        Tier::HighPriority => [60, 55, 45, 35, 30],
        Tier::Unassigned => [25, 20, 10, 5, 5],
        Tier::General => [5, 5, 0, 0, 0],
    };
    row[column]
}

fn unassigned(eos: &[ElementOccurrence]) -> Vec<usize> {
    eos.iter()
        .enumerate()
        .filter(|(_, eo)| eo.is_eligible() && eo.tier == Tier::Unassigned)
        .map(|(i, _)| i)
        .collect()
}

/// Rank Unassigned EOs within each element and promote them into tiers
/// until the element's target fills. Criteria run in order: military
/// percentage (optional), EO-rank, observation year (optional); a Vital EO
/// is then picked per element from the High Priority pool.
pub fn score_eos(
    eos: &mut Vec<ElementOccurrence>,
    summary: &[ElementSummary],
    use_military: bool,
    use_year: bool,
) {
    // Elements still open for ranking, with their targets.
    let mut targets: BTreeMap<String, usize> = summary
        .iter()
        .filter(|row| row.init_tier == Tier::Unassigned)
        .map(|row| (row.elcode.clone(), row.target))
        .collect();
    info!(elements = targets.len(), "ranking Unassigned EOs");

    if use_military {
        let idxs = unassigned(eos);
        for (idx, rank) in compute_ranks(
            eos,
            &idxs,
            |eo| eo.percent_mil,
            Order::Ascending,
            5.0,
            ThreshType::Abs,
            None,
        ) {
            eos[idx].ranks.mil = rank;
        }
        update_tiers(eos, &mut targets, |eo| eo.ranks.mil);
    }

    let idxs = unassigned(eos);
    for (idx, rank) in compute_ranks(
        eos,
        &idxs,
        |eo| eo.eorank_num as f64,
        Order::Ascending,
        0.5,
        ThreshType::Abs,
        None,
    ) {
        eos[idx].ranks.eo = rank;
    }
    update_tiers(eos, &mut targets, |eo| eo.ranks.eo);

    if use_year {
        let idxs = unassigned(eos);
        for (idx, rank) in compute_ranks(
            eos,
            &idxs,
            |eo| eo.obs_year as f64,
            Order::Descending,
            3.0,
            ThreshType::Abs,
            None,
        ) {
            eos[idx].ranks.year = rank;
        }
        update_tiers(eos, &mut targets, |eo| eo.ranks.year);
    }
    if !targets.is_empty() {
        info!(count = targets.len(), "elements with open slots remaining");
    }

    promote_vital(eos, use_year);

    // Conservation values follow the tier standings at this point.
    for eo in eos.iter_mut() {
        if eo.is_eligible() {
            eo.eo_consvalue = cons_value(eo.tier, &eo.new_grank);
        }
    }
}

/// One Vital EO per element that holds any High Priority rows: the unique
/// top of the EO-rank standing, falling back to the unique most recent
/// observation among the top-ranked.
fn promote_vital(eos: &mut [ElementOccurrence], use_year: bool) {
    let hp: Vec<usize> = eos
        .iter()
        .enumerate()
        .filter(|(_, eo)| eo.tier == Tier::HighPriority)
        .map(|(i, _)| i)
        .collect();
    if hp.is_empty() {
        return;
    }

    // Standings within the High Priority pool only; these local ranks never
    // overwrite the stored ranking fields.
    let eo_rank_pairs = compute_ranks(
        eos,
        &hp,
        |eo| eo.eorank_num as f64,
        Order::Ascending,
        0.5,
        ThreshType::Abs,
        None,
    );
    let mut top_by_element: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for &(idx, rank) in &eo_rank_pairs {
        if rank == 1 {
            top_by_element
                .entry(eos[idx].elcode.as_str())
                .or_default()
                .push(idx);
        }
    }

    let mut vital: Vec<usize> = Vec::new();
    let mut unresolved: Vec<(String, Vec<usize>)> = Vec::new();
    for (elcode, tops) in top_by_element {
        if tops.len() == 1 {
            vital.push(tops[0]);
        } else {
            unresolved.push((elcode.to_string(), tops));
        }
    }

    if use_year {
        for (_, tops) in unresolved {
            let year_pairs = compute_ranks(
                eos,
                &tops,
                |eo| eo.obs_year as f64,
                Order::Descending,
                3.0,
                ThreshType::Abs,
                None,
            );
            let top_years: Vec<usize> = year_pairs
                .iter()
                .filter(|&&(_, rank)| rank == 1)
                .map(|&(idx, _)| idx)
                .collect();
            if top_years.len() == 1 {
                vital.push(top_years[0]);
            }
        }
    }

    info!(count = vital.len(), "Vital EOs selected");
    for idx in vital {
        eos[idx].tier = Tier::Vital;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::fixtures::eo_at;
    use crate::types::TargetStatus;

    fn summary_row(elcode: &str, target: usize, count: usize) -> ElementSummary {
        ElementSummary {
            elcode: elcode.to_string(),
            sname: String::new(),
            new_grank: "G3".to_string(),
            count_all_eo: count,
            count_inelig_eo: 0,
            count_elig_eo: count,
            excluded: false,
            num_reg: 1,
            target,
            init_tier: ElementSummary::initial_tier(count),
            mean_bmi: 0.0,
            bmi_at_rank: [0; 5],
            count_irreplaceable: 0,
            count_critical: 0,
            count_vital: 0,
            count_high_priority: 0,
            count_general: 0,
            count_unassigned: 0,
            portfolio: 0,
            status: TargetStatus::NotApplicable,
        }
    }

    #[test]
    fn eorank_fills_targets_and_vital_emerges() {
        // Four EOs, target 2. EO-ranks: A(1), B(4), B(4), C(7).
        let mut eos = vec![
            eo_at("AAAAA00001", 1, 0.0, 0.0),
            eo_at("AAAAA00001", 2, 200.0, 0.0),
            eo_at("AAAAA00001", 3, 400.0, 0.0),
            eo_at("AAAAA00001", 4, 600.0, 0.0),
        ];
        eos[0].eorank = "A".to_string();
        eos[0].eorank_num = 1;
        eos[3].eorank = "C".to_string();
        eos[3].eorank_num = 7;
        let summary = vec![summary_row("AAAAA00001", 2, 4)];

        score_eos(&mut eos, &summary, false, true);

        // The A-ranked EO and one B (most recent wins, but both 2020 ties;
        // the rank-eo pass promotes A first, then year cannot split the Bs,
        // leaving them Unassigned and C demoted).
        assert_eq!(eos[0].tier, Tier::Vital); // top of HP pool, unique
        assert_eq!(eos[3].tier, Tier::General);
        let unassigned: usize = eos.iter().filter(|e| e.tier == Tier::Unassigned).count();
        assert_eq!(unassigned, 2);
    }

    #[test]
    fn year_breaks_eorank_ties() {
        let mut eos = vec![
            eo_at("AAAAA00001", 1, 0.0, 0.0),
            eo_at("AAAAA00001", 2, 200.0, 0.0),
            eo_at("AAAAA00001", 3, 400.0, 0.0),
        ];
        eos[0].obs_year = 2022;
        eos[1].obs_year = 2010;
        eos[2].obs_year = 2000;
        let summary = vec![summary_row("AAAAA00001", 1, 3)];

        score_eos(&mut eos, &summary, false, true);
        // All tie on EO-rank; the 2022 observation fills the single slot.
        assert_eq!(eos[0].tier, Tier::Vital);
        assert_eq!(eos[1].tier, Tier::General);
        assert_eq!(eos[2].tier, Tier::General);
    }

    #[test]
    fn cons_value_matrix_spot_checks() {
        assert_eq!(cons_value(Tier::Irreplaceable, "G1"), 100);
        assert_eq!(cons_value(Tier::Critical, "G3"), 80);
        assert_eq!(cons_value(Tier::Vital, "G5"), 50);
        assert_eq!(cons_value(Tier::HighPriority, "G4"), 35);
        assert_eq!(cons_value(Tier::Unassigned, "G3"), 10);
        assert_eq!(cons_value(Tier::General, "G1"), 5);
    }

    #[test]
    fn small_elements_keep_their_initial_tier() {
        let mut eos = vec![eo_at("AAAAA00001", 1, 0.0, 0.0)];
        eos[0].tier = Tier::Irreplaceable;
        let summary = vec![summary_row("AAAAA00001", 1, 1)];
        score_eos(&mut eos, &summary, false, true);
        assert_eq!(eos[0].tier, Tier::Irreplaceable);
        assert_eq!(eos[0].eo_consvalue, 85);
    }
}
