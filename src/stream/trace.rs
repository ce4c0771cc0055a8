//! Network point generation, service-area solving, and gap filling for the
//! stream delineator.

use anyhow::Result;
use geo::{BooleanOps, Coord, Intersects, LineString, MultiLineString, Point};
use tracing::{debug, info};

use crate::geom::line_length;
use crate::stream::align::AlignedPf;
use crate::stream::linework::{group_length, nearest_on_line, unsplit_lines};
use crate::stream::net::{Barrier, FlowNet, NetPosition, TravelMode};
use crate::stream::StreamConfig;
use crate::types::NwiFeat;

/// A network start/end point generated from a PF, tagged tidal or not.
#[derive(Clone, Debug)]
pub(crate) struct NetworkPoint {
    pub sfid: String,
    pub pt: Point<f64>,
    pub tidal: bool,
}

/// Points where flowlines enter and leave each aligned PF. Tidal status
/// joins from the NWI wetlands clipped to the PF.
pub(crate) fn make_network_points(
    aligned: &[AlignedPf],
    net: &FlowNet,
    nwi: &[NwiFeat],
) -> Vec<NetworkPoint> {
    let mut points: Vec<NetworkPoint> = Vec::new();
    let mut seen: ahash::AHashSet<(i64, i64)> = ahash::AHashSet::new();
    for pf in aligned {
        for line in net.lines() {
            let clipped = pf
                .geom
                .clip(&MultiLineString(vec![line.geom.clone()]), false);
            for piece in &clipped.0 {
                if piece.0.len() < 2 {
                    continue;
                }
                for c in [*piece.0.first().unwrap(), *piece.0.last().unwrap()] {
                    let key = ((c.x * 1000.0).round() as i64, (c.y * 1000.0).round() as i64);
                    if !seen.insert(key) {
                        continue;
                    }
                    let pt = Point::new(c.x, c.y);
                    let tidal = nwi
                        .iter()
                        .filter(|n| n.tidal)
                        .any(|n| n.geom.intersects(&pf.geom) && n.geom.intersects(&pt));
                    points.push(NetworkPoint {
                        sfid: pf.sfid.clone(),
                        pt,
                        tidal,
                    });
                }
            }
        }
    }
    info!(count = points.len(), "network points generated");
    points
}

/// Solve the three service areas and combine the traversed flowlines into
/// unsplit SCS line groups, patching small inter-trace gaps.
pub(crate) fn create_scs_lines(
    points: &[NetworkPoint],
    net: &FlowNet,
    dams: &[Barrier],
    cfg: &StreamConfig,
) -> Result<Vec<Vec<LineString<f64>>>> {
    let barriers = net.locate_barriers(dams, cfg.dam_tol);

    let mut segments: Vec<LineString<f64>> = Vec::new();
    let mut unlocated = 0usize;
    for point in points {
        let Some(fac) = net.locate(point.pt, cfg.facility_tol) else {
            unlocated += 1;
            continue;
        };
        if point.tidal {
            segments.extend(net.service_area(fac, TravelMode::AllDirections, cfg.tidal_dist, &barriers));
        } else {
            segments.extend(net.service_area(fac, TravelMode::Downstream, cfg.down_dist, &barriers));
            segments.extend(net.service_area(fac, TravelMode::Upstream, cfg.up_dist, &barriers));
        }
    }
    if unlocated > 0 {
        debug!(unlocated, "facilities beyond the network search tolerance");
    }

    let mut groups = unsplit_lines(segments);
    if groups.len() > 1 {
        let fills = fill_lines(&groups, net, &barriers, cfg);
        if !fills.is_empty() {
            info!(count = fills.len(), "filling small gaps between traces");
            let mut all: Vec<LineString<f64>> = groups.into_iter().flatten().collect();
            all.extend(fills);
            groups = unsplit_lines(all);
        }
    }
    Ok(groups)
}

/// Un-included flowlines short enough to be a gap, touching two or more
/// trace groups, and not near a dam.
fn fill_lines(
    groups: &[Vec<LineString<f64>>],
    net: &FlowNet,
    barriers: &[NetPosition],
    cfg: &StreamConfig,
) -> Vec<LineString<f64>> {
    let dam_coords: Vec<Coord<f64>> = barriers
        .iter()
        .map(|b| crate::stream::linework::point_at(&net.lines()[b.line].geom, b.measure))
        .collect();

    let mut fills = Vec::new();
    for line in net.lines() {
        let len = line_length(&line.geom);
        if len > cfg.max_fill_len {
            continue;
        }
        // Already traced lines are not gaps: test the midpoint.
        let mid = crate::stream::linework::point_at(&line.geom, len / 2.0);
        let covered = groups.iter().flatten().any(|seg| {
            nearest_on_line(seg, Point::new(mid.x, mid.y)).0 < 0.5
        });
        if covered {
            continue;
        }
        // Reject fills near dams; a dam is a real break.
        let near_dam = dam_coords.iter().any(|d| {
            nearest_on_line(&line.geom, Point::new(d.x, d.y)).0 <= 100.0
        });
        if near_dam {
            continue;
        }
        // Count distinct groups touched by the candidate's endpoints.
        let ends = [
            *line.geom.0.first().unwrap(),
            *line.geom.0.last().unwrap(),
        ];
        let touched = groups
            .iter()
            .filter(|group| {
                group.iter().any(|seg| {
                    ends.iter()
                        .any(|e| nearest_on_line(seg, Point::new(e.x, e.y)).0 < 1.0)
                })
            })
            .count();
        if touched >= 2 {
            fills.push(line.geom.clone());
        }
    }
    fills
}

/// Total length of all line groups; used by reports and tests.
#[allow(dead_code)]
pub(crate) fn total_trace_length(groups: &[Vec<LineString<f64>>]) -> f64 {
    groups.iter().map(|g| group_length(g)).sum()
}

#[cfg(test)]
mod tests {
    use geo::{Coord, LineString};

    use super::*;
    use crate::stream::net::Flowline;

    fn seg(coords: &[(f64, f64)]) -> LineString<f64> {
        LineString(coords.iter().map(|&(x, y)| Coord { x, y }).collect())
    }

    fn chain_net() -> FlowNet {
        // Three lines in a row; the middle one is short (300 m).
        FlowNet::new(vec![
            Flowline { id: 1, from_node: 1, to_node: 2, geom: seg(&[(0.0, 0.0), (2000.0, 0.0)]) },
            Flowline { id: 2, from_node: 2, to_node: 3, geom: seg(&[(2000.0, 0.0), (2300.0, 0.0)]) },
            Flowline { id: 3, from_node: 3, to_node: 4, geom: seg(&[(2300.0, 0.0), (5000.0, 0.0)]) },
        ])
    }

    #[test]
    fn short_gap_between_traces_is_filled() {
        let net = chain_net();
        let groups = vec![
            vec![seg(&[(0.0, 0.0), (2000.0, 0.0)])],
            vec![seg(&[(2300.0, 0.0), (5000.0, 0.0)])],
        ];
        let cfg = StreamConfig::default();
        let fills = fill_lines(&groups, &net, &[], &cfg);
        assert_eq!(fills.len(), 1);
        assert!((line_length(&fills[0]) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn gap_near_dam_is_not_filled() {
        let net = chain_net();
        let groups = vec![
            vec![seg(&[(0.0, 0.0), (2000.0, 0.0)])],
            vec![seg(&[(2300.0, 0.0), (5000.0, 0.0)])],
        ];
        let cfg = StreamConfig::default();
        let dam = net.locate(Point::new(2100.0, 0.0), 10.0).unwrap();
        let fills = fill_lines(&groups, &net, &[dam], &cfg);
        assert!(fills.is_empty());
    }

    #[test]
    fn long_gaps_stay_open() {
        // Make the middle line too long to count as a gap.
        let net = FlowNet::new(vec![
            Flowline { id: 1, from_node: 1, to_node: 2, geom: seg(&[(0.0, 0.0), (2000.0, 0.0)]) },
            Flowline { id: 2, from_node: 2, to_node: 3, geom: seg(&[(2000.0, 0.0), (2800.0, 0.0)]) },
            Flowline { id: 3, from_node: 3, to_node: 4, geom: seg(&[(2800.0, 0.0), (5000.0, 0.0)]) },
        ]);
        let groups = vec![
            vec![seg(&[(0.0, 0.0), (2000.0, 0.0)])],
            vec![seg(&[(2800.0, 0.0), (5000.0, 0.0)])],
        ];
        let cfg = StreamConfig::default();
        assert!(fill_lines(&groups, &net, &[], &cfg).is_empty());
    }
}
