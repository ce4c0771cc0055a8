#![doc = "Reproducible delineation and prioritization of Natural Heritage \
conservation sites: rule-driven habitat polygons around procedural \
features, multi-pass site assembly against hydrography and transportation \
modifiers, stream-network tracing, and a target-driven portfolio of \
Essential Conservation Sites."]

mod assemble;
mod ecs;
pub mod geom;
mod io;
mod modifier;
mod sbb;
mod stream;
mod types;
mod workspace;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[doc(inline)]
pub use assemble::{assemble_sites, AssembleParams, AssembleReport};
#[doc(inline)]
pub use ecs::{
    attribute_eos, build_portfolio, flatten_conslands, run_prioritization, score_bmi, score_eos,
    BuildMode, PrioritizationConfig, PrioritizationInputs, PrioritizationOutputs,
    PrioritizationReport,
};
#[doc(inline)]
pub use io::{write_element_sheet, write_eo_sheet, write_site_sheet};
#[doc(inline)]
pub use modifier::{cull_erase_feats, get_erase_feats, ModifierSet};
#[doc(inline)]
pub use sbb::{build_sbbs, expand_sbbs, SbbReport};
#[doc(inline)]
pub use stream::{
    delineate_stream_sites, Barrier, FlowNet, Flowline, NetPosition, StreamConfig, StreamInputs,
    StreamReport, TravelMode,
};
#[doc(inline)]
pub use types::{
    ConsLand, EcoRegion, ElementExclusion, ElementOccurrence, ElementSummary, EoRanks, Exclusion,
    HydroFeat, ModFeat, NwiFeat, ProcFeat, RankedSite, Rule, Sbb, Site, SiteKind, TargetStatus,
    Tier,
};
#[doc(inline)]
pub use workspace::Workspace;

/// Inputs of a terrestrial or AHZ delineation run.
pub struct DelineationInputs {
    pub pfs: Vec<ProcFeat>,
    pub modifiers: ModifierSet,
}

/// Knobs of a delineation run.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct DelineationConfig {
    pub assemble: AssembleParams,
}

/// Combined per-run problem record of a delineation.
#[derive(Clone, Debug, Default)]
pub struct DelineationReport {
    pub sbb: SbbReport,
    pub assemble: AssembleReport,
}

/// Delineate Conservation Sites of the given class: build SBBs by rule,
/// expand them into habitat cores, and run the site assembler. Stream sites
/// go through [`delineate_stream_sites`] instead.
pub fn run_delineation(
    inputs: DelineationInputs,
    site_type: SiteKind,
    cfg: &DelineationConfig,
    ws: &Workspace,
) -> Result<(Vec<Site>, DelineationReport)> {
    let (sbbs, sbb_report) = build_sbbs(&inputs.pfs, &inputs.modifiers.nwi, ws)?;
    let sbbs = if inputs.modifiers.cores.is_empty() {
        sbbs
    } else {
        expand_sbbs(&inputs.modifiers.cores, &sbbs, &inputs.pfs, ws)?
    };
    let (sites, assemble_report) = assemble_sites(
        &sbbs,
        &inputs.pfs,
        &inputs.modifiers,
        site_type,
        &cfg.assemble,
        ws,
    )?;
    Ok((
        sites,
        DelineationReport {
            sbb: sbb_report,
            assemble: assemble_report,
        },
    ))
}
