//! Route export: chaining selected edges into walks and writing GPX

use crate::utils::{self, NodeKey};
use crate::{Result, RouteSolution, SelectedEdge};
use gpx::{Gpx, GpxVersion, TrackSegment};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// Value of the `creator` attribute in written files
pub const GPX_CREATOR: &str = "trail-planner";

/// Chain the selected directed edges into walks.
///
/// Walks start at nodes with one more outgoing than incoming edge (the open
/// ends), then at the lowest remaining node for closed loops. Every selected
/// edge appears in exactly one walk.
pub fn ordered_walks(solution: &RouteSolution) -> Vec<Vec<SelectedEdge>> {
    let edges = solution.selected_edges();
    let mut outgoing: BTreeMap<NodeKey, Vec<usize>> = BTreeMap::new();
    let mut balance: BTreeMap<NodeKey, i64> = BTreeMap::new();
    for (index, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push(index);
        *balance.entry(edge.from).or_insert(0) += 1;
        *balance.entry(edge.to).or_insert(0) -= 1;
    }

    let open_ends: BTreeSet<NodeKey> = balance
        .iter()
        .filter(|(_, value)| **value > 0)
        .map(|(key, _)| *key)
        .collect();

    let mut used = vec![false; edges.len()];
    let mut walks = Vec::new();
    loop {
        let next_unused = |node: &NodeKey| {
            outgoing
                .get(node)
                .and_then(|indices| indices.iter().copied().find(|&i| !used[i]))
        };
        let start = open_ends
            .iter()
            .chain(outgoing.keys())
            .find(|node| next_unused(*node).is_some())
            .copied();
        let Some(mut current) = start else {
            break;
        };

        let mut walk = Vec::new();
        while let Some(index) = outgoing
            .get(&current)
            .and_then(|indices| indices.iter().copied().find(|&i| !used[i]))
        {
            used[index] = true;
            walk.push(edges[index].clone());
            current = edges[index].to;
        }
        walks.push(walk);
    }
    walks
}

/// Build a GPX document with one track holding one segment per walk
pub fn to_gpx(solution: &RouteSolution, name: &str) -> Gpx {
    let mut track = gpx::Track::default();
    track.name = Some(name.to_string());
    track.description = Some(format!("{:.2} km", solution.total_distance()));

    for walk in ordered_walks(solution) {
        let mut segment = TrackSegment::default();
        for edge in &walk {
            for coord in edge.geometry().coords() {
                // Consecutive paths share their junction point
                let repeated = segment
                    .points
                    .last()
                    .is_some_and(|last| utils::waypoint_to_coord(last) == *coord);
                if !repeated {
                    segment.points.push(utils::coord_to_waypoint(*coord));
                }
            }
        }
        track.segments.push(segment);
    }

    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(GPX_CREATOR.to_string()),
        ..Default::default()
    };
    gpx.tracks.push(track);
    gpx
}

/// Write the route as GPX to `writer`
pub fn write_gpx<W: Write>(solution: &RouteSolution, name: &str, writer: W) -> Result<()> {
    gpx::write(&to_gpx(solution, name), writer)?;
    Ok(())
}

/// Write the route as GPX to a file, creating parent directories
pub fn save_gpx(solution: &RouteSolution, name: &str, path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_gpx(solution, name, std::io::BufWriter::new(file))?;
    tracing::info!("Route written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewPath, PathRegistry, RouteOptimizer, RouteQuery, TrailGraph, geometry};
    use geo::coord;

    fn solved(edges: &[((f64, f64), (f64, f64))]) -> RouteSolution {
        let mut registry = PathRegistry::new();
        let paths: Vec<_> = edges
            .iter()
            .enumerate()
            .map(|(i, (a, b))| {
                let (a, b) = (coord! { x: a.0, y: a.1 }, coord! { x: b.0, y: b.1 });
                registry.get_or_create(NewPath {
                    name: format!("0_1_T{i}"),
                    track: format!("T{i}"),
                    geometry: geometry::segment_line(a, b),
                    origin: a.into(),
                    destination: b.into(),
                })
            })
            .collect();
        let graph = TrailGraph::from_paths(&paths);
        let mut optimizer = RouteOptimizer::new(&graph);
        optimizer
            .solve(RouteQuery::new(0.0, 100.0))
            .unwrap()
            .solution()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_open_walk_is_chained_from_its_end() {
        let solution = solved(&[
            ((0.0, 0.0), (0.01, 0.0)),
            ((0.02, 0.0), (0.01, 0.0)),
            ((0.02, 0.0), (0.03, 0.0)),
        ]);
        let walks = ordered_walks(&solution);
        assert_eq!(walks.len(), 1);
        let walk = &walks[0];
        assert_eq!(walk.len(), 3);
        for pair in walk.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
    }

    #[test]
    fn test_loop_becomes_one_walk() {
        let solution = solved(&[
            ((0.0, 0.0), (0.01, 0.0)),
            ((0.01, 0.0), (0.01, 0.01)),
            ((0.01, 0.01), (0.0, 0.0)),
        ]);
        let walks = ordered_walks(&solution);
        assert_eq!(walks.len(), 1);
        assert_eq!(walks[0].first().unwrap().from, walks[0].last().unwrap().to);
    }

    #[test]
    fn test_gpx_output_has_no_duplicate_junctions() {
        let solution = solved(&[((0.0, 0.0), (0.01, 0.0)), ((0.01, 0.0), (0.02, 0.0))]);
        let gpx = to_gpx(&solution, "Loop");
        assert_eq!(gpx.tracks.len(), 1);
        assert_eq!(gpx.tracks[0].segments.len(), 1);
        assert_eq!(gpx.tracks[0].segments[0].points.len(), 3);
        assert_eq!(gpx.tracks[0].name.as_deref(), Some("Loop"));
    }

    #[test]
    fn test_written_gpx_reads_back() {
        let solution = solved(&[((0.0, 0.0), (0.01, 0.0)), ((0.01, 0.0), (0.02, 0.0))]);
        let mut buffer = Vec::new();
        write_gpx(&solution, "Ridge Route", &mut buffer).unwrap();

        let parsed = gpx::read(buffer.as_slice()).unwrap();
        assert_eq!(parsed.tracks.len(), 1);
        let points = &parsed.tracks[0].segments[0].points;
        assert_eq!(points.len(), 3);
        let ends = [
            utils::waypoint_to_coord(&points[0]),
            utils::waypoint_to_coord(&points[2]),
        ];
        assert!(ends.contains(&coord! { x: 0.0, y: 0.0 }));
        assert!(ends.contains(&coord! { x: 0.02, y: 0.0 }));
    }

    #[test]
    fn test_empty_solution_writes_empty_track() {
        let gpx = to_gpx(&RouteSolution::default(), "Nothing");
        assert_eq!(gpx.tracks.len(), 1);
        assert!(gpx.tracks[0].segments.is_empty());
    }
}
