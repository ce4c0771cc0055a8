//! Spreadsheet export: one CSV row per EO, site, or element summary row.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::types::{ElementOccurrence, ElementSummary, RankedSite};

fn field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn write_rows(path: &Path, header: &str, rows: Vec<String>) -> Result<()> {
    let mut out = String::with_capacity(rows.len() * 64 + header.len());
    out.push_str(header);
    out.push('\n');
    for row in rows {
        out.push_str(&row);
        out.push('\n');
    }
    std::fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the reduced per-EO sheet.
pub fn write_eo_sheet(path: &Path, eos: &[ElementOccurrence]) -> Result<()> {
    let header = "SF_EOID,ELCODE,SNAME,EORANK,OBSYEAR,TIER,PORTFOLIO,EEO_TIER,ESSENTIAL";
    let rows = eos
        .iter()
        .map(|eo| {
            let mut row = String::new();
            let _ = write!(
                row,
                "{},{},{},{},{},{},{},{},{}",
                eo.eo_id,
                field(&eo.elcode),
                field(&eo.sname),
                field(&eo.eorank),
                eo.obs_year,
                eo.tier,
                eo.portfolio,
                field(&eo.eeo_tier),
                field(&eo.essential),
            );
            row
        })
        .collect();
    write_rows(path, header, rows)
}

/// Write the per-site sheet.
pub fn write_site_sheet(path: &Path, sites: &[RankedSite]) -> Result<()> {
    let header =
        "SITEID,SITENAME,SITE_TYPE,CS_CONSVALUE,CS_AREA_HA,BMI_SCORE,ECS_TIER,ESSENTIAL,PORTFOLIO,EEO_SUMMARY";
    let rows = sites
        .iter()
        .map(|s| {
            let mut row = String::new();
            let _ = write!(
                row,
                "{},{},{},{},{:.2},{},{},{},{},{}",
                field(&s.site.site_id),
                field(&s.site.site_name),
                s.site.kind,
                s.cs_consvalue,
                s.cs_area_ha,
                s.bmi_score,
                field(&s.ecs_tier),
                field(&s.essential),
                s.portfolio,
                field(&s.eeo_summary),
            );
            row
        })
        .collect();
    write_rows(path, header, rows)
}

/// Write the element summary sheet.
pub fn write_element_sheet(path: &Path, rows_in: &[ElementSummary]) -> Result<()> {
    let header = "ELCODE,SNAME,NEW_GRANK,COUNT_ALL_EO,COUNT_INELIG_EO,COUNT_ELIG_EO,EXCL,NUM_REG,TARGET,INIT_TIER,PORTFOLIO,STATUS";
    let rows = rows_in
        .iter()
        .map(|r| {
            let mut row = String::new();
            let _ = write!(
                row,
                "{},{},{},{},{},{},{},{},{},{},{},{}",
                field(&r.elcode),
                field(&r.sname),
                field(&r.new_grank),
                r.count_all_eo,
                r.count_inelig_eo,
                r.count_elig_eo,
                if r.excluded { "Yes" } else { "No" },
                r.num_reg,
                r.target,
                r.init_tier,
                r.portfolio,
                r.status,
            );
            row
        })
        .collect();
    write_rows(path, header, rows)
}

#[cfg(test)]
mod tests {
    use super::field;

    #[test]
    fn quoting() {
        assert_eq!(field("plain"), "plain");
        assert_eq!(field("a,b"), "\"a,b\"");
        assert_eq!(field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
