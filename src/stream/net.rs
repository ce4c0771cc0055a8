//! Directed flowline network with cutoff traversal and dam barriers: the
//! narrow "network dataset" interface the stream delineator solves against.

use ahash::AHashMap;
use geo::{LineString, Point};
use tracing::warn;

use crate::geom::line_length;
use crate::stream::linework::{nearest_on_line, substring};

/// One NHD flowline segment, digitized from upstream to downstream.
#[derive(Clone, Debug)]
pub struct Flowline {
    pub id: i64,
    pub from_node: i64,
    pub to_node: i64,
    pub geom: LineString<f64>,
}

/// Travel modes of the service-area solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TravelMode {
    Downstream,
    Upstream,
    AllDirections,
}

/// A dam barrier as supplied: a point and a name.
#[derive(Clone, Debug)]
pub struct Barrier {
    pub x: f64,
    pub y: f64,
    pub name: String,
}

impl Barrier {
    #[inline]
    pub fn point(&self) -> Point<f64> {
        Point::new(self.x, self.y)
    }
}

/// A network position: a line index and a measure along it.
#[derive(Clone, Copy, Debug)]
pub struct NetPosition {
    pub line: usize,
    pub measure: f64,
}

/// The flowline network. Node adjacency is indexed once at construction;
/// traversal is budgeted breadth-first relaxation over nodes, with partial
/// segments cut by measure.
pub struct FlowNet {
    lines: Vec<Flowline>,
    lengths: Vec<f64>,
    node_index: AHashMap<i64, usize>,
    /// Lines leaving each node (their `from_node` is the node).
    out_lines: Vec<Vec<usize>>,
    /// Lines entering each node (their `to_node` is the node).
    in_lines: Vec<Vec<usize>>,
}

impl FlowNet {
    pub fn new(lines: Vec<Flowline>) -> Self {
        let mut node_index = AHashMap::new();
        let mut next = 0usize;
        for line in &lines {
            for node in [line.from_node, line.to_node] {
                node_index.entry(node).or_insert_with(|| {
                    next += 1;
                    next - 1
                });
            }
        }
        let mut out_lines = vec![Vec::new(); next];
        let mut in_lines = vec![Vec::new(); next];
        for (idx, line) in lines.iter().enumerate() {
            out_lines[node_index[&line.from_node]].push(idx);
            in_lines[node_index[&line.to_node]].push(idx);
        }
        let lengths = lines.iter().map(|l| line_length(&l.geom)).collect();
        Self {
            lines,
            lengths,
            node_index,
            out_lines,
            in_lines,
        }
    }

    #[inline]
    pub fn lines(&self) -> &[Flowline] {
        &self.lines
    }

    #[inline]
    pub fn line_length(&self, idx: usize) -> f64 {
        self.lengths[idx]
    }

    /// Snap a point to the nearest network position within `tolerance`.
    pub fn locate(&self, pt: Point<f64>, tolerance: f64) -> Option<NetPosition> {
        let mut best: Option<(f64, NetPosition)> = None;
        for (idx, line) in self.lines.iter().enumerate() {
            let (dist, measure, _) = nearest_on_line(&line.geom, pt);
            if dist <= tolerance && best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, NetPosition { line: idx, measure }));
            }
        }
        best.map(|(_, pos)| pos)
    }

    /// Snap dams onto the network. Dams that cannot be located within the
    /// tolerance are dropped with a warning; an unlocatable barrier would
    /// otherwise poison the solver.
    pub fn locate_barriers(&self, dams: &[Barrier], tolerance: f64) -> Vec<NetPosition> {
        let mut located = Vec::new();
        let mut dropped = Vec::new();
        for dam in dams {
            match self.locate(dam.point(), tolerance) {
                Some(pos) => located.push(pos),
                None => dropped.push(dam.name.clone()),
            }
        }
        if !dropped.is_empty() {
            warn!(
                "deleting {} dams that could not be located on the network: {}",
                dropped.len(),
                dropped.join(", ")
            );
        }
        located
    }

    /// Solve a service area: the portions of the network reachable from the
    /// facility within `cutoff` meters under the given travel mode, not
    /// crossing any barrier. Returns the traversed sub-polylines.
    pub fn service_area(
        &self,
        facility: NetPosition,
        mode: TravelMode,
        cutoff: f64,
        barriers: &[NetPosition],
    ) -> Vec<LineString<f64>> {
        let mut by_line: AHashMap<usize, Vec<f64>> = AHashMap::new();
        for b in barriers {
            by_line.entry(b.line).or_default().push(b.measure);
        }
        for measures in by_line.values_mut() {
            measures.sort_by(f64::total_cmp);
        }

        let down = matches!(mode, TravelMode::Downstream | TravelMode::AllDirections);
        let up = matches!(mode, TravelMode::Upstream | TravelMode::AllDirections);

        // intervals[line] accumulates traversed (start, end) measures.
        let mut intervals: AHashMap<usize, Vec<(f64, f64)>> = AHashMap::new();
        // budget[node] is the best remaining distance seen at that node.
        let mut budget: AHashMap<usize, f64> = AHashMap::new();
        let mut queue: Vec<(usize, f64)> = Vec::new();

        // Seed from the facility along its own line.
        let line = facility.line;
        let len = self.lengths[line];
        let m = facility.measure.clamp(0.0, len);
        if down {
            let stop = by_line
                .get(&line)
                .and_then(|ms| ms.iter().copied().find(|&b| b >= m));
            let end = stop.unwrap_or(len).min(m + cutoff);
            push_interval(&mut intervals, line, m, end);
            if stop.is_none() && m + cutoff >= len {
                relax(
                    &mut budget,
                    &mut queue,
                    self.node_index[&self.lines[line].to_node],
                    cutoff - (len - m),
                );
            }
        }
        if up {
            let stop = by_line
                .get(&line)
                .and_then(|ms| ms.iter().rev().copied().find(|&b| b <= m));
            let start = stop.unwrap_or(0.0).max(m - cutoff);
            push_interval(&mut intervals, line, start, m);
            if stop.is_none() && m - cutoff <= 0.0 {
                relax(
                    &mut budget,
                    &mut queue,
                    self.node_index[&self.lines[line].from_node],
                    cutoff - m,
                );
            }
        }

        while let Some((node, b)) = queue.pop() {
            if budget.get(&node).copied().unwrap_or(-1.0) > b {
                continue;
            }
            if down {
                for &e in &self.out_lines[node] {
                    let len = self.lengths[e];
                    let stop = by_line.get(&e).and_then(|ms| ms.first().copied());
                    let end = stop.unwrap_or(len).min(b);
                    if end > 0.0 {
                        push_interval(&mut intervals, e, 0.0, end);
                    }
                    if stop.is_none() && b >= len {
                        relax(
                            &mut budget,
                            &mut queue,
                            self.node_index[&self.lines[e].to_node],
                            b - len,
                        );
                    }
                }
            }
            if up {
                for &e in &self.in_lines[node] {
                    let len = self.lengths[e];
                    let stop = by_line.get(&e).and_then(|ms| ms.last().copied());
                    let start = stop.unwrap_or(0.0).max(len - b);
                    if start < len {
                        push_interval(&mut intervals, e, start, len);
                    }
                    if stop.is_none() && b >= len {
                        relax(
                            &mut budget,
                            &mut queue,
                            self.node_index[&self.lines[e].from_node],
                            b - len,
                        );
                    }
                }
            }
        }

        // Merge intervals per line and cut the sub-polylines.
        let mut out = Vec::new();
        let mut touched: Vec<usize> = intervals.keys().copied().collect();
        touched.sort_unstable();
        for line in touched {
            let mut ivs = intervals.remove(&line).unwrap();
            ivs.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut merged: Vec<(f64, f64)> = Vec::new();
            for (s, e) in ivs {
                match merged.last_mut() {
                    Some(last) if s <= last.1 + 1e-6 => last.1 = last.1.max(e),
                    _ => merged.push((s, e)),
                }
            }
            for (s, e) in merged {
                if e - s > 1e-6 {
                    out.push(substring(&self.lines[line].geom, s, e));
                }
            }
        }
        out
    }
}

fn push_interval(intervals: &mut AHashMap<usize, Vec<(f64, f64)>>, line: usize, s: f64, e: f64) {
    if e > s {
        intervals.entry(line).or_default().push((s, e));
    }
}

fn relax(budget: &mut AHashMap<usize, f64>, queue: &mut Vec<(usize, f64)>, node: usize, b: f64) {
    if b <= 0.0 {
        return;
    }
    let current = budget.get(&node).copied().unwrap_or(-1.0);
    if b > current {
        budget.insert(node, b);
        queue.push((node, b));
    }
}

#[cfg(test)]
mod tests {
    use geo::Coord;

    use super::*;

    /// A Y network: two headwaters joining at (1000, 0), draining east.
    ///   line 0: (0,500) -> (1000,0)    length ~1118
    ///   line 1: (0,-500) -> (1000,0)   length ~1118
    ///   line 2: (1000,0) -> (3000,0)   length 2000
    fn y_net() -> FlowNet {
        let mk = |id, from, to, coords: Vec<(f64, f64)>| Flowline {
            id,
            from_node: from,
            to_node: to,
            geom: LineString(coords.into_iter().map(|(x, y)| Coord { x, y }).collect()),
        };
        FlowNet::new(vec![
            mk(0, 1, 3, vec![(0.0, 500.0), (1000.0, 0.0)]),
            mk(1, 2, 3, vec![(0.0, -500.0), (1000.0, 0.0)]),
            mk(2, 3, 4, vec![(1000.0, 0.0), (3000.0, 0.0)]),
        ])
    }

    fn total_length(lines: &[LineString<f64>]) -> f64 {
        lines.iter().map(line_length).sum()
    }

    #[test]
    fn downstream_stops_at_cutoff() {
        let net = y_net();
        let fac = net.locate(Point::new(1000.0, 0.0), 10.0).unwrap();
        let lines = net.service_area(fac, TravelMode::Downstream, 500.0, &[]);
        assert!((total_length(&lines) - 500.0).abs() < 1.0);
    }

    #[test]
    fn upstream_traverses_both_branches() {
        let net = y_net();
        let fac = net.locate(Point::new(1500.0, 0.0), 10.0).unwrap();
        let lines = net.service_area(fac, TravelMode::Upstream, 3000.0, &[]);
        // 500 back on line 2, then both branches fully (~1118 each).
        let total = total_length(&lines);
        assert!(total > 2600.0 && total < 2800.0, "total {total}");
    }

    #[test]
    fn barrier_blocks_traversal() {
        let net = y_net();
        let fac = net.locate(Point::new(1500.0, 0.0), 10.0).unwrap();
        // Dam on line 2 at x = 1200 blocks the upstream walk before the fork.
        let dam = net.locate(Point::new(1200.0, 0.0), 10.0).unwrap();
        let lines = net.service_area(fac, TravelMode::Upstream, 3000.0, &[dam]);
        assert!((total_length(&lines) - 300.0).abs() < 1.0);
    }

    #[test]
    fn all_directions_spreads_both_ways() {
        let net = y_net();
        let fac = net.locate(Point::new(1500.0, 0.0), 10.0).unwrap();
        let lines = net.service_area(fac, TravelMode::AllDirections, 600.0, &[]);
        // 600 downstream plus 500 up to the fork and 100 into each branch.
        let total = total_length(&lines);
        assert!(total > 1250.0 && total < 1350.0, "total {total}");
    }

    #[test]
    fn unlocatable_dams_are_dropped() {
        let net = y_net();
        let dams = vec![
            Barrier { x: 1200.0, y: 0.0, name: "ok".to_string() },
            Barrier { x: 99_999.0, y: 99_999.0, name: "lost".to_string() },
        ];
        let located = net.locate_barriers(&dams, 100.0);
        assert_eq!(located.len(), 1);
    }
}
