use std::fmt;

use geo::MultiPolygon;

/// Conservation site class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SiteKind {
    /// Terrestrial Conservation Site.
    Tcs,
    /// Anthropogenic Habitat Zone.
    Ahz,
    /// Stream Conservation Site (or Unit).
    Scs,
    /// Cave Site.
    Kcs,
    /// Migratory Animal Conservation Site.
    Macs,
}

impl SiteKind {
    /// Parse the `SITE_TYPE` attribute carried by site inputs.
    pub fn from_site_type(text: &str) -> Option<SiteKind> {
        match text.trim() {
            "Conservation Site" | "TCS" => Some(SiteKind::Tcs),
            "Anthropogenic Habitat Zone" | "AHZ" => Some(SiteKind::Ahz),
            "SCS" | "SCU" => Some(SiteKind::Scs),
            "Cave Site" | "KCS" => Some(SiteKind::Kcs),
            "Migratory Animal Conservation Site" | "MACS" => Some(SiteKind::Macs),
            _ => None,
        }
    }

    /// Site kinds implied by a set of PF rule strings. Number-only rules are
    /// terrestrial; prefixes select the other classes.
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a str>) -> Vec<SiteKind> {
        let mut kinds = Vec::new();
        let mut push = |k| {
            if !kinds.contains(&k) {
                kinds.push(k)
            }
        };
        for rule in rules {
            let rule = rule.trim();
            if rule.starts_with("AHZ") {
                push(SiteKind::Ahz);
            } else if rule.starts_with("KCS") {
                push(SiteKind::Kcs);
            } else if rule.starts_with("MACS") {
                push(SiteKind::Macs);
            } else if rule.starts_with("SCS") {
                push(SiteKind::Scs);
            } else if rule.chars().all(|c| c.is_ascii_digit()) && !rule.is_empty() {
                push(SiteKind::Tcs);
            }
        }
        kinds.sort();
        kinds
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SiteKind::Tcs => "TCS",
            SiteKind::Ahz => "AHZ",
            SiteKind::Scs => "SCS",
            SiteKind::Kcs => "KCS",
            SiteKind::Macs => "MACS",
        };
        write!(f, "{text}")
    }
}

/// A Conservation Site boundary, either an input (previous cycle) or a
/// product of the delineation engine.
#[derive(Clone, Debug)]
pub struct Site {
    pub site_id: String,
    pub site_name: String,
    pub kind: SiteKind,
    /// Biodiversity rank carried through for comparison outputs; never
    /// computed here.
    pub brank: Option<String>,
    pub geom: MultiPolygon<f64>,
}

/// A site annotated by the ECS prioritizer.
#[derive(Clone, Debug)]
pub struct RankedSite {
    pub site: Site,
    pub cs_consvalue: i32,
    pub cs_area_ha: f64,
    pub bmi_score: i32,
    /// Minimum `FinalRANK` among EOs joined to this site, if any.
    pub min_final_rank: Option<i16>,
    /// Text of the best EO tier in the site, or "NA" when no eligible EO
    /// joins to it.
    pub ecs_tier: String,
    pub essential: String,
    /// Text summary counting joined eligible EOs per tier.
    pub eeo_summary: String,
    pub portfolio: i8,
    pub override_: i8,
}

impl RankedSite {
    pub(crate) fn new(site: Site) -> Self {
        let cs_area_ha = geo::Area::unsigned_area(&site.geom) / 10_000.0;
        Self {
            site,
            cs_consvalue: 0,
            cs_area_ha,
            bmi_score: 0,
            min_final_rank: None,
            ecs_tier: "NA".to_string(),
            essential: "NA".to_string(),
            eeo_summary: String::new(),
            portfolio: 0,
            override_: 0,
        }
    }
}
