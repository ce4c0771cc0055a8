use std::fmt;

use geo::MultiPolygon;

use crate::types::{SiteKind, Tier};

/// Eligibility classification of an element occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exclusion {
    Keep,
    NotViable,
    OldObservation,
    ExcludedElement,
    ErrorCheckNeeded,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Exclusion::Keep => "Keep",
            Exclusion::NotViable => "Not viable",
            Exclusion::OldObservation => "Old Observation",
            Exclusion::ExcludedElement => "Excluded Element",
            Exclusion::ErrorCheckNeeded => "Error Check Needed",
        };
        write!(f, "{text}")
    }
}

/// Per-criterion competition ranks, filled as the scorer and portfolio
/// builder walk the criteria sequence. Zero means the criterion never ran
/// for this EO.
#[derive(Clone, Copy, Debug, Default)]
pub struct EoRanks {
    pub mil: i32,
    pub eo: i32,
    pub year: i32,
    pub bmi: i32,
    pub nap: i32,
    pub cs_val: i32,
    pub num_pf: i32,
    pub eo_area: i32,
}

/// An element occurrence: the dissolve of all Procedural Features sharing an
/// `SF_EOID`, carrying every attribute computed by the ECS pipeline.
/// Re-derived from scratch on every prioritization run.
#[derive(Clone, Debug)]
pub struct ElementOccurrence {
    pub eo_id: i64,
    pub elcode: String,
    pub sname: String,
    pub eorank: String,
    /// A..D ranks mapped onto 1..10; unrankable is 11.
    pub eorank_num: i16,
    /// Normalized G-rank (T-ranks folded in; unranked defaults to G5).
    pub new_grank: String,
    pub obs_year: i32,
    /// 0 = beyond the cutoff year (ineligible), 1 = flagged "Update Needed",
    /// 2 = recent.
    pub recent: i16,
    pub exclusion: Exclusion,
    /// Site classes this EO can join, derived from its member PF rules.
    pub site_kinds: Vec<SiteKind>,
    /// Number of member PFs.
    pub pf_count: usize,
    pub percent_mil: f64,
    pub bmi_score: i32,
    /// Intersects a State Natural Area Preserve.
    pub ysn_nap: bool,
    /// Ecoregion codes the EO overlaps.
    pub ecoregions: Vec<String>,
    /// Code of the ecoregion with the largest overlap.
    pub gen_reg: Option<String>,
    /// Modified competition rank of `eorank_num` within the element.
    pub eo_modrank: i32,
    pub tier: Tier,
    pub ranks: EoRanks,
    pub eo_consvalue: i32,
    /// Best (max) site conservation value among joined sites.
    pub cs_consvalue: i32,
    pub cs_area_ha: f64,
    pub cs_site_ids: String,
    pub cs_site_names: String,
    pub portfolio: i8,
    /// -1 forces the EO out of the portfolio, 1 forces it in, -2 marks a
    /// mid-run drop (reset to 0 on output).
    pub override_: i8,
    pub bycatch: bool,
    pub ext_tier: String,
    pub eeo_tier: String,
    pub essential: String,
    pub area_sqm: f64,
    pub geom: MultiPolygon<f64>,
}

impl ElementOccurrence {
    /// Whether this EO survives the eligibility screen.
    #[inline]
    pub fn is_eligible(&self) -> bool {
        self.exclusion == Exclusion::Keep
    }

    #[inline]
    pub fn choice_rank(&self) -> i16 {
        self.tier.choice_rank()
    }
}
