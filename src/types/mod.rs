mod eo;
mod pf;
mod rule;
mod site;
mod summary;
mod tier;

pub use eo::{ElementOccurrence, EoRanks, Exclusion};
pub use pf::{ConsLand, EcoRegion, ElementExclusion, HydroFeat, ModFeat, NwiFeat, ProcFeat, Sbb};
pub use rule::Rule;
pub use site::{RankedSite, Site, SiteKind};
pub use summary::{ElementSummary, TargetStatus};
pub use tier::Tier;
