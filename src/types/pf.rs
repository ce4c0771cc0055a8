use geo::MultiPolygon;

use crate::types::Rule;

/// A Procedural Feature: the atomic input polygon representing a documented
/// species or community occurrence, in a projected CRS (meters).
#[derive(Clone, Debug)]
pub struct ProcFeat {
    /// Stable unique source feature ID.
    pub sfid: String,
    /// Element occurrence this feature belongs to (`SF_EOID`, many-to-one).
    pub eo_id: i64,
    /// Element (species/community) identifier.
    pub elcode: String,
    pub sname: String,
    /// Raw rule text: "1".."15", "AHZ", "KCS", "MACS", "SCS1", "SCS2".
    pub rule: String,
    /// Optional buffer distance in meters; semantics depend on the rule.
    pub buffer: Option<f64>,
    pub eorank: String,
    pub grank: String,
    pub srank: String,
    /// Rounded G-rank used for target setting (`RNDGRNK`).
    pub rnd_grank: String,
    /// ISO date or any string with a leading 4-digit year.
    pub eolastobs: String,
    pub fedstat: String,
    pub sprot: String,
    pub geom: MultiPolygon<f64>,
}

impl ProcFeat {
    #[inline]
    pub fn rule(&self) -> Rule {
        Rule::from_text(&self.rule)
    }
}

/// A Site Building Block: the per-PF habitat polygon produced by the
/// rule-specific construction. Exists only during one delineation run.
#[derive(Clone, Debug)]
pub struct Sbb {
    pub sfid: String,
    /// Canonical rule (`intRule` in legacy attribute terms).
    pub rule: Rule,
    /// Final buffer distance used, if the rule defines one (`fltBuffer`).
    pub buffer: Option<f64>,
    pub geom: MultiPolygon<f64>,
}

/// Hydrography polygon; only features flagged `Hydro = 1` are eligible to
/// erase site area.
#[derive(Clone, Debug)]
pub struct HydroFeat {
    pub hydro: i32,
    pub geom: MultiPolygon<f64>,
}

impl HydroFeat {
    #[inline]
    pub fn is_eraser(&self) -> bool {
        self.hydro == 1
    }
}

/// Transportation-surface or manual-exclusion polygon. `NH_IGNORE = 1`
/// withholds a feature from splitting sites; 0 or null means use it.
#[derive(Clone, Debug)]
pub struct ModFeat {
    pub nh_ignore: Option<i32>,
    pub geom: MultiPolygon<f64>,
}

impl ModFeat {
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.nh_ignore, None | Some(0))
    }
}

/// National Wetlands Inventory polygon with pre-parsed rule and tidal flags.
///
/// The upstream code-table parser is obsolete; inputs arrive with the binary
/// columns already populated.
#[derive(Clone, Debug)]
pub struct NwiFeat {
    pub attribute: String,
    pub rule5: bool,
    pub rule6: bool,
    pub rule7: bool,
    pub rule9: bool,
    pub tidal: bool,
    pub geom: MultiPolygon<f64>,
}

impl NwiFeat {
    /// Whether this wetland participates in the given numbered rule.
    pub fn matches_rule(&self, rule: u8) -> bool {
        match rule {
            5 => self.rule5,
            6 => self.rule6,
            7 => self.rule7,
            9 => self.rule9,
            _ => false,
        }
    }
}

/// Conservation land (managed area) with its Biodiversity Management Intent
/// class ("1" best .. "5" least, or "U") and managed-area type.
#[derive(Clone, Debug)]
pub struct ConsLand {
    pub bmi: String,
    pub matype: String,
    pub geom: MultiPolygon<f64>,
}

/// Ecoregion polygon with its generalized region code.
#[derive(Clone, Debug)]
pub struct EcoRegion {
    pub code: String,
    pub geom: MultiPolygon<f64>,
}

/// Row of the element-exclusions table.
#[derive(Clone, Debug)]
pub struct ElementExclusion {
    pub elcode: Option<String>,
    pub exclude: bool,
}
