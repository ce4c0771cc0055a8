//! End-to-end stream site delineation against a small synthetic network.

use consite::{
    delineate_stream_sites, Barrier, FlowNet, Flowline, ProcFeat, SiteKind, StreamConfig,
    StreamInputs, Workspace,
};
use geo::{Contains, Coord, Intersects, LineString, MultiPolygon, Polygon};

fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
    rect(x0, y0, size, size)
}

fn rect(x0: f64, y0: f64, w: f64, h: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![Polygon::new(
        LineString(vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + w, y: y0 },
            Coord { x: x0 + w, y: y0 + h },
            Coord { x: x0, y: y0 + h },
            Coord { x: x0, y: y0 },
        ]),
        vec![],
    )])
}

fn scs_pf(sfid: &str, rule: &str, geom: MultiPolygon<f64>) -> ProcFeat {
    ProcFeat {
        sfid: sfid.to_string(),
        eo_id: 1,
        elcode: "AFCAA01010".to_string(),
        sname: "Fishus rarus".to_string(),
        rule: rule.to_string(),
        buffer: None,
        eorank: "B".to_string(),
        grank: "G2".to_string(),
        srank: "S1".to_string(),
        rnd_grank: "G2".to_string(),
        eolastobs: "2021-04-01".to_string(),
        fedstat: String::new(),
        sprot: String::new(),
        geom,
    }
}

/// One straight river flowing east for 10 km.
fn river_net() -> FlowNet {
    FlowNet::new(vec![Flowline {
        id: 1,
        from_node: 1,
        to_node: 2,
        geom: LineString(vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 10_000.0, y: 0.0 }]),
    }])
}

fn catchments() -> Vec<MultiPolygon<f64>> {
    (0..5)
        .map(|i| rect(i as f64 * 2000.0, -1000.0, 2000.0, 2000.0))
        .collect()
}

fn inputs(rule: &str, dams: Vec<Barrier>) -> StreamInputs {
    StreamInputs {
        // Offset 150 m north of the river: the aligner must shift it on.
        pfs: vec![scs_pf("s1", rule, square(4950.0, 150.0, 100.0))],
        net: river_net(),
        dams,
        catchments: catchments(),
        stream_river: vec![],
        lake_pond: vec![],
        nwi: vec![],
        flow_buffers: None,
    }
}

#[test]
fn trace_buffers_into_one_site() {
    let ws = Workspace::in_memory(None);
    let (sites, report) =
        delineate_stream_sites(&inputs("SCS1", vec![]), &StreamConfig::default(), &ws).unwrap();
    assert!(report.failed_groups.is_empty());
    assert_eq!(report.group_count, 1);
    assert_eq!(sites.len(), 1);
    let site = &sites[0];
    assert_eq!(site.kind, SiteKind::Scs);

    // Covers the river corridor upstream of the PF...
    assert!(site.geom.contains(&Coord { x: 3000.0, y: 0.0 }));
    assert!(site.geom.contains(&Coord { x: 3000.0, y: 100.0 }));
    // ...but stays in the 150 m ribbon and inside the trace extent.
    assert!(!site.geom.contains(&Coord { x: 3000.0, y: 400.0 }));
    assert!(!site.geom.contains(&Coord { x: 9000.0, y: 0.0 }));
    // Downstream reach is the short 500 m leg.
    assert!(site.geom.contains(&Coord { x: 5400.0, y: 0.0 }));
    assert!(!site.geom.contains(&Coord { x: 6500.0, y: 0.0 }));
}

#[test]
fn dam_truncates_the_upstream_reach() {
    let ws = Workspace::in_memory(None);
    let dam = Barrier {
        x: 3000.0,
        y: 0.0,
        name: "NID-001".to_string(),
    };
    let (sites, _) =
        delineate_stream_sites(&inputs("SCS1", vec![dam]), &StreamConfig::default(), &ws).unwrap();
    assert_eq!(sites.len(), 1);
    // Blocked at x = 3000: nothing upstream of the dam.
    assert!(!sites[0].geom.contains(&Coord { x: 2500.0, y: 0.0 }));
    assert!(sites[0].geom.contains(&Coord { x: 3500.0, y: 0.0 }));
}

#[test]
fn scs2_takes_whole_catchments() {
    let ws = Workspace::in_memory(None);
    let (sites, _) =
        delineate_stream_sites(&inputs("SCS2", vec![]), &StreamConfig::default(), &ws).unwrap();
    assert_eq!(sites.len(), 1);
    // The PF's catchment is burned in whole, far beyond the 150 m ribbon.
    assert!(sites[0].geom.contains(&Coord { x: 5000.0, y: 800.0 }));
}

#[test]
fn widewater_polygons_join_the_buffer() {
    let mut input = inputs("SCS1", vec![]);
    // A pond on the trace at x 4000..4400, reaching 300 m north.
    input.lake_pond = vec![rect(4000.0, -100.0, 400.0, 400.0)];
    let ws = Workspace::in_memory(None);
    let (sites, _) = delineate_stream_sites(&input, &StreamConfig::default(), &ws).unwrap();
    assert_eq!(sites.len(), 1);
    // The pond plus its 150 m halo is part of the site.
    assert!(sites[0].geom.contains(&Coord { x: 4200.0, y: 350.0 }));
    // An SCS1-only run without the pond stays at the ribbon there.
    let (bare, _) =
        delineate_stream_sites(&inputs("SCS1", vec![]), &StreamConfig::default(), &ws).unwrap();
    assert!(!bare[0].geom.contains(&Coord { x: 4200.0, y: 350.0 }));
}

#[test]
fn traces_intersect_their_lines() {
    let ws = Workspace::in_memory(None);
    let (sites, _) =
        delineate_stream_sites(&inputs("SCS1", vec![]), &StreamConfig::default(), &ws).unwrap();
    let line = LineString(vec![Coord { x: 4000.0, y: 0.0 }, Coord { x: 5000.0, y: 0.0 }]);
    assert!(sites[0].geom.intersects(&line));
}
