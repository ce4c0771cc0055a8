//! Site Building Block construction: one habitat polygon per Procedural
//! Feature, by rule.

mod expand;
mod wetland;

pub use expand::expand_sbbs;

use anyhow::Result;
use tracing::{info, warn};

use crate::geom::buffer;
use crate::types::{NwiFeat, ProcFeat, Sbb};
use crate::workspace::Workspace;

/// Per-run record of SBB construction problems. All entries are non-fatal.
#[derive(Clone, Debug, Default)]
pub struct SbbReport {
    /// SFIDs whose rule-specific construction failed.
    pub failed: Vec<String>,
    /// SFIDs skipped because no SBB path applies (unknown rule, or rule 10
    /// with an impermissible buffer).
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
}

/// Build SBBs for every input PF, dispatching on the normalized rule.
///
/// Simple-buffer rules buffer the PF by the rule's distance; zero-buffer
/// rules use the PF itself; wetland rules 5/6/7/9 combine the minimum buffer
/// with proximal NWI features, clipped to the maximum buffer.
pub fn build_sbbs(
    pfs: &[ProcFeat],
    nwi: &[NwiFeat],
    ws: &Workspace,
) -> Result<(Vec<Sbb>, SbbReport)> {
    let mut report = SbbReport::default();
    let mut sbbs = Vec::with_capacity(pfs.len());

    let wetland_index = wetland::NwiIndex::new(nwi);

    for pf in pfs {
        let rule = pf.rule();
        let (flt_buffer, rule_warning) = rule.effective_buffer(pf.buffer);
        if let Some(msg) = rule_warning {
            warn!(sfid = %pf.sfid, %msg, "invalid rule configuration");
            report.warnings.push(format!("{}: {msg}", pf.sfid));
        }

        if rule.is_wetland() {
            match wetland::wetland_sbb(pf, &wetland_index) {
                // A zero override is the only buffer a wetland SBB records.
                Ok(geom) => sbbs.push(Sbb {
                    sfid: pf.sfid.clone(),
                    rule,
                    buffer: flt_buffer.filter(|b| *b == 0.0),
                    geom,
                }),
                Err(err) => {
                    warn!(sfid = %pf.sfid, %err, "wetland SBB failed");
                    report.failed.push(pf.sfid.clone());
                }
            }
            continue;
        }

        match flt_buffer {
            Some(dist) if dist != 0.0 => sbbs.push(Sbb {
                sfid: pf.sfid.clone(),
                rule,
                buffer: Some(dist),
                geom: buffer(&pf.geom, dist),
            }),
            Some(_) => sbbs.push(Sbb {
                sfid: pf.sfid.clone(),
                rule,
                buffer: Some(0.0),
                geom: pf.geom.clone(),
            }),
            None => {
                report.skipped.push(pf.sfid.clone());
            }
        }
    }

    if !report.failed.is_empty() {
        warn!(
            "SBB processing failed for features: {}",
            report.failed.join(", ")
        );
    }
    info!(
        built = sbbs.len(),
        skipped = report.skipped.len(),
        "SBB creation complete"
    );
    ws.dump("sbb", &sbbs.iter().map(|s| s.geom.clone()).collect::<Vec<_>>());
    Ok((sbbs, report))
}
