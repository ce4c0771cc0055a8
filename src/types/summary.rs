use std::fmt;

use crate::types::Tier;

/// Whether an element's conservation target was satisfied by the portfolio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetStatus {
    Met,
    Exceeded,
    NotMet,
    NotApplicable,
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TargetStatus::Met => "Target met",
            TargetStatus::Exceeded => "Target exceeded",
            TargetStatus::NotMet => "Target not met",
            TargetStatus::NotApplicable => "N/A",
        };
        write!(f, "{text}")
    }
}

/// One summary row per element (`ELCODE`), rewritten on every run.
#[derive(Clone, Debug)]
pub struct ElementSummary {
    pub elcode: String,
    pub sname: String,
    pub new_grank: String,
    pub count_all_eo: usize,
    pub count_inelig_eo: usize,
    pub count_elig_eo: usize,
    /// "Yes" when the element appears in the exclusions table.
    pub excluded: bool,
    /// Number of ecoregions occupied by eligible EOs.
    pub num_reg: usize,
    /// Conservation target: 10 for G1, 5 for G2, else 2, capped by the
    /// eligible count.
    pub target: usize,
    pub init_tier: Tier,
    pub mean_bmi: f64,
    /// BMI score of the rank-n eligible EO (descending), for n in
    /// {1, 2, 3, 5, 10}; zero when fewer EOs exist.
    pub bmi_at_rank: [i32; 5],
    pub count_irreplaceable: usize,
    pub count_critical: usize,
    pub count_vital: usize,
    pub count_high_priority: usize,
    pub count_general: usize,
    pub count_unassigned: usize,
    /// EOs of this element currently in the portfolio.
    pub portfolio: usize,
    pub status: TargetStatus,
}

impl ElementSummary {
    /// Initial target from the normalized G-rank and eligible count.
    pub fn target_for(grank: &str, eligible: usize) -> usize {
        let initial = match grank {
            "G1" => 10,
            "G2" => 5,
            _ => 2,
        };
        initial.min(eligible)
    }

    /// Initial tier from the eligible count: a lone EO is irreplaceable, a
    /// pair is critical, anything more starts unassigned.
    pub fn initial_tier(eligible: usize) -> Tier {
        match eligible {
            1 => Tier::Irreplaceable,
            2 => Tier::Critical,
            _ => Tier::Unassigned,
        }
    }

    /// Open portfolio slots remaining for this element.
    #[inline]
    pub fn open_slots(&self) -> usize {
        self.target.saturating_sub(self.portfolio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_follow_grank_and_cap() {
        assert_eq!(ElementSummary::target_for("G1", 20), 10);
        assert_eq!(ElementSummary::target_for("G2", 20), 5);
        assert_eq!(ElementSummary::target_for("G3", 20), 2);
        assert_eq!(ElementSummary::target_for("G1", 4), 4);
        assert_eq!(ElementSummary::target_for("G5", 1), 1);
    }

    #[test]
    fn initial_tiers() {
        assert_eq!(ElementSummary::initial_tier(1), Tier::Irreplaceable);
        assert_eq!(ElementSummary::initial_tier(2), Tier::Critical);
        assert_eq!(ElementSummary::initial_tier(3), Tier::Unassigned);
    }
}
