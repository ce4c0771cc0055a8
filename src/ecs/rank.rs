//! Threshold-dense ranking within elements, and the tier/slot update walks
//! driven by those ranks.

use std::collections::BTreeMap;

use crate::types::{ElementOccurrence, Tier};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreshType {
    Abs,
    Per,
}

/// Compute within-element dense ranks over the given EO indices.
///
/// Sorted values rank equal while they stay within `thresh` of the last
/// value that caused a rank increment (absolute, or percent for `Per`).
/// Optional decimal rounding stabilizes doubles. Returns `(index, rank)`
/// pairs; ranks within each element form a contiguous run from 1.
pub(crate) fn compute_ranks(
    eos: &[ElementOccurrence],
    idxs: &[usize],
    value: impl Fn(&ElementOccurrence) -> f64,
    order: Order,
    thresh: f64,
    threshtype: ThreshType,
    rounding: Option<i32>,
) -> Vec<(usize, i32)> {
    let round = |v: f64| match rounding {
        Some(n) => {
            let f = 10f64.powi(n);
            (v * f).round() / f
        }
        None => v,
    };

    let mut groups: BTreeMap<&str, Vec<(usize, f64)>> = BTreeMap::new();
    for &i in idxs {
        groups
            .entry(eos[i].elcode.as_str())
            .or_default()
            .push((i, round(value(&eos[i]))));
    }

    let mut out = Vec::with_capacity(idxs.len());
    for (_, mut items) in groups {
        items.sort_by(|a, b| match order {
            Order::Ascending => a.1.total_cmp(&b.1).then(eos[a.0].eo_id.cmp(&eos[b.0].eo_id)),
            Order::Descending => b.1.total_cmp(&a.1).then(eos[a.0].eo_id.cmp(&eos[b.0].eo_id)),
        });
        let mut rank = 1;
        let mut anchor = items[0].1;
        for (n, &(idx, v)) in items.iter().enumerate() {
            if n > 0 {
                let diff = match threshtype {
                    ThreshType::Abs => (v - anchor).abs(),
                    ThreshType::Per => {
                        100.0 * (v - anchor).abs() / anchor.abs().max(f64::MIN_POSITIVE)
                    }
                };
                if diff > thresh {
                    anchor = v;
                    rank += 1;
                }
            }
            out.push((idx, rank));
        }
    }
    out
}

/// Convert within-element dense ranks into modified competition ranks: each
/// rank maps to the running count of members at or below it.
pub(crate) fn mod_ranks(pairs: &[(usize, i32)], eos: &[ElementOccurrence]) -> Vec<(usize, i32)> {
    let mut groups: BTreeMap<&str, Vec<(usize, i32)>> = BTreeMap::new();
    for &(idx, rank) in pairs {
        groups
            .entry(eos[idx].elcode.as_str())
            .or_default()
            .push((idx, rank));
    }
    let mut out = Vec::with_capacity(pairs.len());
    for (_, mut members) in groups {
        members.sort_by_key(|&(_, rank)| rank);
        let mut counts: BTreeMap<i32, i32> = BTreeMap::new();
        for &(_, rank) in &members {
            *counts.entry(rank).or_insert(0) += 1;
        }
        let mut running = 0;
        let mut modified: BTreeMap<i32, i32> = BTreeMap::new();
        for (rank, count) in counts {
            running += count;
            modified.insert(rank, running);
        }
        for (idx, rank) in members {
            out.push((idx, modified[&rank]));
        }
    }
    out
}

/// Promote Unassigned EOs into High Priority by rank until each element's
/// open slots fill; rows ranked beyond the fill point demote to General.
/// When a rank ties across more EOs than slots remain, the tied rows stay
/// Unassigned for the next criterion and only the rows beyond them demote.
/// Elements whose slots fill are removed from `targets`.
pub(crate) fn update_tiers(
    eos: &mut [ElementOccurrence],
    targets: &mut BTreeMap<String, usize>,
    rank_of: impl Fn(&ElementOccurrence) -> i32,
) {
    for (elcode, avail) in targets.iter_mut() {
        let members = |eos: &[ElementOccurrence]| -> Vec<usize> {
            eos.iter()
                .enumerate()
                .filter(|(_, eo)| {
                    eo.elcode == *elcode && eo.tier == Tier::Unassigned && eo.is_eligible()
                })
                .map(|(i, _)| i)
                .collect()
        };
        let mut rnks: Vec<i32> = members(eos).iter().map(|&i| rank_of(&eos[i])).collect();
        rnks.sort_unstable();
        rnks.dedup();

        for rv in rnks {
            if *avail == 0 {
                break;
            }
            let current = members(eos);
            let q1: Vec<usize> = current
                .iter()
                .copied()
                .filter(|&i| rank_of(&eos[i]) <= rv)
                .collect();
            let c = q1.len();
            if c == 0 {
                break;
            }
            if c < *avail {
                for i in q1 {
                    eos[i].tier = Tier::HighPriority;
                }
                *avail -= c;
            } else if c == *avail {
                for i in q1 {
                    eos[i].tier = Tier::HighPriority;
                }
                for i in current {
                    if rank_of(&eos[i]) > rv && eos[i].tier == Tier::Unassigned {
                        eos[i].tier = Tier::General;
                    }
                }
                *avail = 0;
                break;
            } else {
                // Ties exceed the open slots: leave the tied rows for the
                // next criterion, demote everything beyond them.
                for i in current {
                    if rank_of(&eos[i]) > rv {
                        eos[i].tier = Tier::General;
                    }
                }
                break;
            }
        }
    }
    targets.retain(|_, avail| *avail > 0);
}

/// Portfolio analogue of [`update_tiers`]: adds Unassigned EOs to the
/// portfolio by rank. Rows ranked beyond an over-subscribed rank are marked
/// `OVERRIDE = -2` so later criteria skip them; nothing is demoted here.
pub(crate) fn update_slots(
    eos: &mut [ElementOccurrence],
    slots: &mut BTreeMap<String, usize>,
    rank_of: impl Fn(&ElementOccurrence) -> i32,
) {
    for (elcode, avail) in slots.iter_mut() {
        let members = |eos: &[ElementOccurrence]| -> Vec<usize> {
            eos.iter()
                .enumerate()
                .filter(|(_, eo)| {
                    eo.elcode == *elcode
                        && eo.tier == Tier::Unassigned
                        && eo.portfolio == 0
                        && eo.override_ > -1
                })
                .map(|(i, _)| i)
                .collect()
        };
        let mut rnks: Vec<i32> = members(eos).iter().map(|&i| rank_of(&eos[i])).collect();
        rnks.sort_unstable();
        rnks.dedup();

        for rv in rnks {
            if *avail == 0 {
                break;
            }
            let current = members(eos);
            let q1: Vec<usize> = current
                .iter()
                .copied()
                .filter(|&i| rank_of(&eos[i]) <= rv)
                .collect();
            let c = q1.len();
            if c == 0 {
                break;
            }
            if c < *avail {
                for i in q1 {
                    eos[i].portfolio = 1;
                }
                *avail -= c;
            } else if c == *avail {
                for i in q1 {
                    eos[i].portfolio = 1;
                }
                *avail = 0;
                break;
            } else {
                for i in current {
                    if rank_of(&eos[i]) > rv {
                        eos[i].override_ = -2;
                    }
                }
                break;
            }
        }
    }
    slots.retain(|_, avail| *avail > 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::fixtures::eo_at;

    #[test]
    fn ranks_are_dense_and_threshold_aware() {
        // Values 1, 1.4, 3, 3.2, 9 with thresh 0.5: groups {1,1.4}, {3,3.2}, {9}.
        let eos: Vec<_> = [1.0, 1.4, 3.0, 3.2, 9.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let mut eo = eo_at("AAAAA00001", i as i64, 0.0, 0.0);
                eo.percent_mil = v;
                eo
            })
            .collect();
        let idxs: Vec<usize> = (0..eos.len()).collect();
        let mut pairs = compute_ranks(
            &eos,
            &idxs,
            |eo| eo.percent_mil,
            Order::Ascending,
            0.5,
            ThreshType::Abs,
            None,
        );
        pairs.sort();
        let ranks: Vec<i32> = pairs.iter().map(|&(_, r)| r).collect();
        assert_eq!(ranks, vec![1, 1, 2, 2, 3]);
    }

    #[test]
    fn descending_order_flips_the_walk() {
        let eos: Vec<_> = [2010.0, 2020.0, 2019.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let mut eo = eo_at("AAAAA00001", i as i64, 0.0, 0.0);
                eo.obs_year = v as i32;
                eo
            })
            .collect();
        let idxs: Vec<usize> = (0..3).collect();
        let mut pairs = compute_ranks(
            &eos,
            &idxs,
            |eo| eo.obs_year as f64,
            Order::Descending,
            3.0,
            ThreshType::Abs,
            None,
        );
        pairs.sort();
        // 2020 and 2019 tie within 3 years; 2010 ranks second.
        assert_eq!(pairs, vec![(0, 2), (1, 1), (2, 1)]);
    }

    #[test]
    fn modified_competition_ranks() {
        let eos: Vec<_> = (0..4)
            .map(|i| eo_at("AAAAA00001", i as i64, 0.0, 0.0))
            .collect();
        // Dense ranks 1, 1, 2, 3 -> modified 2, 2, 3, 4.
        let pairs = vec![(0, 1), (1, 1), (2, 2), (3, 3)];
        let mut modified = mod_ranks(&pairs, &eos);
        modified.sort();
        assert_eq!(modified, vec![(0, 2), (1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn exact_fill_promotes_and_demotes() {
        let mut eos: Vec<_> = (0..4)
            .map(|i| eo_at("AAAAA00001", i as i64, 0.0, 0.0))
            .collect();
        for (i, eo) in eos.iter_mut().enumerate() {
            eo.ranks.eo = (i + 1) as i32;
        }
        let mut targets = BTreeMap::from([("AAAAA00001".to_string(), 2usize)]);
        update_tiers(&mut eos, &mut targets, |eo| eo.ranks.eo);
        assert_eq!(eos[0].tier, Tier::HighPriority);
        assert_eq!(eos[1].tier, Tier::HighPriority);
        assert_eq!(eos[2].tier, Tier::General);
        assert_eq!(eos[3].tier, Tier::General);
        assert!(targets.is_empty());
    }

    #[test]
    fn oversubscribed_tie_stays_unassigned() {
        let mut eos: Vec<_> = (0..3)
            .map(|i| eo_at("AAAAA00001", i as i64, 0.0, 0.0))
            .collect();
        // All tie at rank 1 for a single slot.
        for eo in &mut eos {
            eo.ranks.eo = 1;
        }
        let mut targets = BTreeMap::from([("AAAAA00001".to_string(), 1usize)]);
        update_tiers(&mut eos, &mut targets, |eo| eo.ranks.eo);
        assert!(eos.iter().all(|eo| eo.tier == Tier::Unassigned));
        assert_eq!(targets.get("AAAAA00001"), Some(&1));
    }

    #[test]
    fn slots_mark_excess_rows_for_exclusion() {
        let mut eos: Vec<_> = (0..3)
            .map(|i| eo_at("AAAAA00001", i as i64, 0.0, 0.0))
            .collect();
        eos[0].ranks.bmi = 1;
        eos[1].ranks.bmi = 1;
        eos[2].ranks.bmi = 2;
        let mut slots = BTreeMap::from([("AAAAA00001".to_string(), 2usize)]);
        update_slots(&mut eos, &mut slots, |eo| eo.ranks.bmi);
        assert_eq!(eos[0].portfolio, 1);
        assert_eq!(eos[1].portfolio, 1);
        assert_eq!(eos[2].portfolio, 0);
        assert!(slots.is_empty());

        // A second element where the tie exceeds the slots.
        let mut eos: Vec<_> = (0..3)
            .map(|i| eo_at("BBBBB00001", i as i64, 0.0, 0.0))
            .collect();
        for eo in &mut eos {
            eo.ranks.bmi = 1;
        }
        let mut slots = BTreeMap::from([("BBBBB00001".to_string(), 2usize)]);
        update_slots(&mut eos, &mut slots, |eo| eo.ranks.bmi);
        assert!(eos.iter().all(|eo| eo.portfolio == 0));
        // No rows beyond the tie, so nothing is marked; slots stay open.
        assert!(eos.iter().all(|eo| eo.override_ == 0));
        assert_eq!(slots.get("BBBBB00001"), Some(&2));
    }
}
