//! End-to-end prioritization scenarios: tier assignment, portfolio
//! dynamics, and the EO/site tier exchange.

use consite::{
    run_prioritization, PrioritizationConfig, PrioritizationInputs, ProcFeat, Site, SiteKind,
    TargetStatus, Tier, Workspace,
};
use geo::{Coord, LineString, MultiPolygon, Polygon};

fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![Polygon::new(
        LineString(vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + size, y: y0 },
            Coord { x: x0 + size, y: y0 + size },
            Coord { x: x0, y: y0 + size },
            Coord { x: x0, y: y0 },
        ]),
        vec![],
    )])
}

fn pf(eo_id: i64, elcode: &str, eorank: &str, x0: f64) -> ProcFeat {
    ProcFeat {
        sfid: format!("sf{eo_id}"),
        eo_id,
        elcode: elcode.to_string(),
        sname: format!("Species {elcode}"),
        rule: "1".to_string(),
        buffer: None,
        eorank: eorank.to_string(),
        grank: "G3".to_string(),
        srank: "S2".to_string(),
        rnd_grank: "G3".to_string(),
        eolastobs: "2020-06-01".to_string(),
        fedstat: String::new(),
        sprot: String::new(),
        geom: square(x0, 0.0, 100.0),
    }
}

fn site(id: &str, x0: f64, size: f64) -> Site {
    Site {
        site_id: id.to_string(),
        site_name: format!("Site {id}"),
        kind: SiteKind::Tcs,
        brank: None,
        geom: square(x0, -100.0, size),
    }
}

fn run(pfs: Vec<ProcFeat>, sites: Vec<Site>) -> consite::PrioritizationOutputs {
    let ws = Workspace::in_memory(None);
    let inputs = PrioritizationInputs {
        sites,
        pfs,
        exclusions: vec![],
        conslands: vec![],
        conslands_flat: vec![],
        ecoregions: vec![],
    };
    run_prioritization(inputs, &PrioritizationConfig::default(), &ws).unwrap()
}

/// Scenario: an element with exactly one eligible EO is irreplaceable, and
/// its site inherits the tier.
#[test]
fn single_eo_element_is_irreplaceable() {
    let out = run(
        vec![pf(1, "ABCDE12345", "B", 0.0)],
        vec![site("cs1", -100.0, 500.0)],
    );
    assert_eq!(out.summary[0].init_tier, Tier::Irreplaceable);
    let eo = &out.eos[0];
    assert_eq!(eo.tier, Tier::Irreplaceable);
    assert_eq!(eo.eeo_tier, "Irreplaceable");
    assert_eq!(eo.essential, "YES - Irreplaceable");
    assert_eq!(eo.portfolio, 1);

    let cs = &out.sites[0];
    assert_eq!(cs.ecs_tier, "Irreplaceable");
    assert_eq!(cs.min_final_rank, Some(1));
    assert_eq!(cs.essential, "YES - Irreplaceable");
    assert_eq!(cs.portfolio, 1);
    assert_eq!(out.summary[0].status, TargetStatus::Met);
}

/// Scenario: bycatch beyond the element's open slots is shut out. A G3
/// element with four eligible EOs (target 2): the A-ranked EO is promoted
/// and pulls its site in; the two B-ranked EOs sitting in that site exceed
/// the single open slot, so they are dropped mid-run and finalized General;
/// the remote EO fills the last slot through secondary ranking.
#[test]
fn bycatch_cannot_exceed_target() {
    let pfs = vec![
        pf(1, "ABCDE12345", "A", 0.0),
        pf(2, "ABCDE12345", "B", 300.0),
        pf(3, "ABCDE12345", "B", 600.0),
        pf(4, "ABCDE12345", "B", 20_000.0),
    ];
    let sites = vec![site("cs1", -100.0, 1000.0), site("cs2", 19_900.0, 500.0)];
    let out = run(pfs, sites);

    let by_id = |id: i64| out.eos.iter().find(|eo| eo.eo_id == id).unwrap();
    // The A-ranked EO rose through the ranking and was made Vital.
    assert_eq!(by_id(1).tier, Tier::Vital);
    // The in-site B pair exceeded the open slot: excluded, not promoted.
    for id in [2, 3] {
        let eo = by_id(id);
        assert_eq!(eo.tier, Tier::General);
        assert_eq!(eo.portfolio, 0);
        // The internal -2 marker is reset on output.
        assert_eq!(eo.override_, 0);
        assert_eq!(eo.ext_tier, "General - Bycatch/Secondary Ranking Demotion");
    }
    // The remote EO filled the remaining slot by secondary ranking.
    let remote = by_id(4);
    assert_eq!(remote.tier, Tier::HighPriority);
    assert_eq!(remote.portfolio, 1);

    // Target compliance.
    let row = &out.summary[0];
    assert_eq!(row.target, 2);
    assert_eq!(row.portfolio, 2);
    assert_eq!(row.status, TargetStatus::Met);
    let in_portfolio = out.eos.iter().filter(|eo| eo.portfolio == 1).count();
    assert!(in_portfolio <= row.target);
}

/// Tier closure: every eligible EO ends in a real tier.
#[test]
fn no_unassigned_tiers_remain() {
    let pfs = vec![
        pf(1, "ABCDE12345", "A", 0.0),
        pf(2, "ABCDE12345", "B", 2000.0),
        pf(3, "ABCDE12345", "B", 4000.0),
        pf(4, "ABCDE12345", "C", 6000.0),
        pf(5, "ZZZZZ99999", "B", 8000.0),
    ];
    let sites = vec![
        site("cs1", -100.0, 300.0),
        site("cs2", 1900.0, 300.0),
        site("cs3", 3900.0, 300.0),
        site("cs4", 5900.0, 300.0),
        site("cs5", 7900.0, 300.0),
    ];
    let out = run(pfs, sites);
    for eo in out.eos.iter().filter(|eo| eo.is_eligible()) {
        assert_ne!(eo.tier, Tier::Unassigned, "EO {} left unassigned", eo.eo_id);
        assert!(!eo.ext_tier.is_empty());
    }
}

/// Site tier equals the best EO tier inside it; empty sites read "NA".
#[test]
fn site_tier_is_best_joined_eo_tier() {
    let pfs = vec![
        pf(1, "ABCDE12345", "B", 0.0),
        pf(2, "ZZZZZ99999", "B", 300.0),
    ];
    let sites = vec![
        // Holds both irreplaceable EOs.
        site("both", -100.0, 600.0),
        // Far away, joins nothing.
        site("empty", 50_000.0, 300.0),
    ];
    let out = run(pfs, sites);
    let by_id = |id: &str| out.sites.iter().find(|s| s.site.site_id == id).unwrap();
    assert_eq!(by_id("both").ecs_tier, "Irreplaceable");
    assert!(by_id("both").eeo_summary.contains("Irreplaceable: 2"));
    assert_eq!(by_id("empty").ecs_tier, "NA");
    assert_eq!(by_id("empty").min_final_rank, None);
    assert_eq!(by_id("empty").eeo_summary, "No essential EOs");
}

/// Not-viable and old EOs never enter tiers or the portfolio, and the
/// summary books them as ineligible.
#[test]
fn ineligible_eos_are_sidelined() {
    let mut bad = pf(2, "ABCDE12345", "D", 300.0);
    bad.eorank = "D".to_string();
    let pfs = vec![pf(1, "ABCDE12345", "B", 0.0), bad];
    let out = run(pfs, vec![site("cs1", -100.0, 600.0)]);

    let row = &out.summary[0];
    assert_eq!(row.count_all_eo, 2);
    assert_eq!(row.count_elig_eo, 1);
    assert_eq!(row.count_inelig_eo, 1);
    // One eligible EO: the element is irreplaceable despite two records.
    assert_eq!(row.init_tier, Tier::Irreplaceable);

    let bad = out.eos.iter().find(|eo| eo.eo_id == 2).unwrap();
    assert_eq!(bad.portfolio, 0);
    assert_eq!(bad.eeo_tier, "NA");
    assert_eq!(bad.ext_tier, "Restoration Potential");
}

/// Element summary portfolio counts never exceed targets, and EO size
/// breaks ties that every earlier criterion leaves open.
#[test]
fn portfolio_respects_targets() {
    // Six same-ranked EOs of a G3 element (target 2), each a different
    // size, every one in its own site.
    let pfs: Vec<ProcFeat> = (0..6)
        .map(|i| {
            let mut p = pf(i as i64 + 1, "ABCDE12345", "B", i as f64 * 2000.0);
            p.geom = square(i as f64 * 2000.0, 0.0, 100.0 + 20.0 * i as f64);
            p
        })
        .collect();
    let sites: Vec<Site> = (0..6)
        .map(|i| site(&format!("cs{i}"), i as f64 * 2000.0 - 100.0, 500.0))
        .collect();
    let out = run(pfs, sites);

    let row = &out.summary[0];
    assert_eq!(row.target, 2);
    assert_eq!(row.portfolio, 2);
    assert_eq!(row.status, TargetStatus::Met);
    // The two largest EOs won the size tiebreak.
    for id in [5, 6] {
        let eo = out.eos.iter().find(|eo| eo.eo_id == id).unwrap();
        assert_eq!(eo.portfolio, 1);
        assert_eq!(eo.tier, Tier::HighPriority);
        assert!(eo.ranks.eo_area >= 1);
    }
    let chosen = out.eos.iter().filter(|eo| eo.portfolio == 1).count();
    assert_eq!(chosen, 2);
}
