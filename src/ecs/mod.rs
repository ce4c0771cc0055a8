//! Essential Conservation Sites prioritization: attribute EOs, rank them
//! within elements, and build a portfolio meeting per-element targets.

mod attribute;
mod join;
mod portfolio;
mod rank;
mod score;

pub use attribute::{attribute_eos, flatten_conslands, score_bmi};
pub use portfolio::{build_portfolio, BuildMode};
pub use score::score_eos;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::{
    ConsLand, EcoRegion, ElementExclusion, ElementOccurrence, ElementSummary, ProcFeat,
    RankedSite, Site, SiteKind,
};
use crate::workspace::Workspace;

/// Inputs of a prioritization run.
pub struct PrioritizationInputs {
    pub sites: Vec<Site>,
    pub pfs: Vec<ProcFeat>,
    pub exclusions: Vec<ElementExclusion>,
    pub conslands: Vec<ConsLand>,
    /// Flattened conservation lands: overlaps resolved so the best (lowest)
    /// BMI class wins. Build with [`flatten_conslands`] if not provided.
    pub conslands_flat: Vec<ConsLand>,
    pub ecoregions: Vec<EcoRegion>,
}

/// Knobs of a prioritization run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrioritizationConfig {
    /// Per site type: (type, cutoff year, flag year). Observations at or
    /// before the cutoff are ineligible; at or before the flag year they
    /// carry "Update Needed".
    pub cut_flag_years: Vec<(String, i32, i32)>,
    /// Rank by military-land percentage (off in production).
    pub use_military: bool,
    /// Rank by observation year.
    pub use_year: bool,
    /// Coincidence tolerance for the EO/site join, meters.
    pub slop: f64,
    pub build: BuildMode,
}

impl Default for PrioritizationConfig {
    fn default() -> Self {
        Self {
            cut_flag_years: Vec::new(),
            use_military: false,
            use_year: true,
            slop: 15.0,
            build: BuildMode::New,
        }
    }
}

impl PrioritizationConfig {
    /// Parsed cut/flag years.
    pub(crate) fn cut_flag_kinds(&self) -> Vec<(SiteKind, i32, i32)> {
        self.cut_flag_years
            .iter()
            .filter_map(|(kind, cut, flag)| {
                SiteKind::from_site_type(kind).map(|k| (k, *cut, *flag))
            })
            .collect()
    }
}

/// Non-fatal problems of a prioritization run.
#[derive(Clone, Debug, Default)]
pub struct PrioritizationReport {
    /// Malformed rows of the element exclusions table.
    pub exclusion_warnings: Vec<String>,
    /// Elements whose ranking failed, left at their current tier.
    pub element_failures: Vec<(String, String)>,
}

/// Outputs of a prioritization run.
pub struct PrioritizationOutputs {
    pub eos: Vec<ElementOccurrence>,
    pub sites: Vec<RankedSite>,
    pub summary: Vec<ElementSummary>,
    pub report: PrioritizationReport,
}

/// Run the full ECS sequence: attribute, score, and build the portfolio.
pub fn run_prioritization(
    inputs: PrioritizationInputs,
    cfg: &PrioritizationConfig,
    ws: &Workspace,
) -> Result<PrioritizationOutputs> {
    anyhow::ensure!(!inputs.pfs.is_empty(), "no procedural features supplied");
    anyhow::ensure!(!inputs.sites.is_empty(), "no conservation sites supplied");

    let (mut eos, mut summary, report) = attribute_eos(
        &inputs.pfs,
        &inputs.exclusions,
        &inputs.conslands,
        &inputs.conslands_flat,
        &inputs.ecoregions,
        &cfg.cut_flag_kinds(),
    )?;
    ws.dump("eos", &eos.iter().map(|e| e.geom.clone()).collect::<Vec<_>>());

    score_eos(&mut eos, &summary, cfg.use_military, cfg.use_year);

    let mut sites: Vec<RankedSite> = inputs.sites.into_iter().map(RankedSite::new).collect();
    build_portfolio(
        &mut eos,
        &mut sites,
        &mut summary,
        &inputs.conslands_flat,
        cfg,
    )?;

    Ok(PrioritizationOutputs {
        eos,
        sites,
        summary,
        report,
    })
}
