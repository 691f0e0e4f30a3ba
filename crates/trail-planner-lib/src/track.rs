//! Track representation: one normalized, one-way trail line
//!
//! A track is loaded from a [`RawTrack`], collapsed to a single direction if
//! it was recorded out-and-back, then cut at its nodes into [`Path`] edges.

use crate::path::NewPath;
use crate::{
    Config, ConnectionTable, GeometryError, Path, PathRegistry, RawTrack, TrackLoadError, geometry,
};
use geo::{BoundingRect, Coord, LineString, Rect};
use std::sync::Arc;

/// A node on a track: its position along the line and its coordinate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeStop {
    /// Distance along the track in degrees
    pub position: f64,
    pub coord: Coord<f64>,
}

impl NodeStop {
    #[inline]
    pub fn key(&self) -> crate::NodeKey {
        self.coord.into()
    }
}

/// A named trail line with its split nodes and path segments
#[derive(Clone, Debug)]
pub struct Track {
    name: String,
    /// Source identifier (file stem for GPX directories)
    identifier: String,
    geometry: LineString<f64>,
    bounding_rect: Rect<f64>,
    /// Length in degrees
    length: f64,
    /// Whether the source recording was collapsed from out-and-back
    doubled: bool,
    /// Position-sorted nodes, built lazily
    nodes: Vec<NodeStop>,
    paths: Vec<Arc<Path>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Track {
    /// Build a track from a raw recording, normalizing its geometry
    pub fn new(raw: RawTrack, config: &Config) -> Result<Self, TrackLoadError> {
        let RawTrack {
            identifier,
            name,
            geometry,
        } = raw;

        let mut coords = geometry.0;
        coords.dedup();
        if coords.len() < 2 {
            return Err(TrackLoadError::TooFewPoints {
                identifier,
                points: coords.len(),
            });
        }

        let (geometry, doubled) = normalize(&name, LineString::new(coords), config);
        if doubled {
            tracing::debug!("Track {} is out-and-back, keeping the first half", name);
        }

        let bounding_rect = geometry
            .bounding_rect()
            .ok_or_else(|| TrackLoadError::TooFewPoints {
                identifier: identifier.clone(),
                points: 0,
            })?;
        let length = geometry::line_length(&geometry);

        Ok(Self {
            name,
            identifier,
            geometry,
            bounding_rect,
            length,
            doubled,
            nodes: Vec::new(),
            paths: Vec::new(),
        })
    }

    /// Build a track directly from a line, using the name as identifier
    pub fn from_geometry(
        name: &str,
        geometry: LineString<f64>,
        config: &Config,
    ) -> Result<Self, TrackLoadError> {
        Self::new(
            RawTrack {
                identifier: name.to_string(),
                name: name.to_string(),
                geometry,
            },
            config,
        )
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[inline]
    pub fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    #[inline]
    pub fn bounding_rect(&self) -> Rect<f64> {
        self.bounding_rect
    }

    /// Length in degrees
    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn is_doubled(&self) -> bool {
        self.doubled
    }

    /// Nodes built so far (empty until [`Track::build_nodes`] runs)
    #[inline]
    pub fn nodes(&self) -> &[NodeStop] {
        &self.nodes
    }

    /// Path segments built so far (empty until [`Track::segment`] runs)
    #[inline]
    pub fn paths(&self) -> &[Arc<Path>] {
        &self.paths
    }

    /// Tracks sharing a connection node with this one
    pub fn connected_tracks<'t>(&self, table: &'t ConnectionTable) -> Vec<(&'t str, Coord<f64>)> {
        table.peers(&self.name)
    }

    /// Compute the node list: both endpoints plus every connection point
    /// projected onto the line.
    ///
    /// A connection whose position is within snap tolerance of an already
    /// accepted node merges into it. An endpoint that has not merged yet
    /// takes the connection coordinate, so tracks joined across a gap share
    /// the node; otherwise the first accepted coordinate wins. Runs once;
    /// later calls return the cached list.
    pub fn build_nodes(&mut self, table: &ConnectionTable, config: &Config) -> &[NodeStop] {
        if !self.nodes.is_empty() {
            return &self.nodes;
        }

        let tolerance = config.snap_tolerance_deg();
        let coords = &self.geometry.0;
        let mut nodes = Vec::with_capacity(2);
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            nodes.push(NodeStop {
                position: 0.0,
                coord: first,
            });
            nodes.push(NodeStop {
                position: self.length,
                coord: last,
            });
        }
        // Endpoints start unclaimed; connection stops are claimed on creation
        let mut claimed = vec![false; nodes.len()];

        for (peer, point) in table.peers(&self.name) {
            let position = geometry::project(&self.geometry, point);
            let existing = nodes
                .iter()
                .position(|node| (node.position - position).abs() < tolerance);
            match existing {
                Some(index) if !claimed[index] => {
                    tracing::debug!(
                        "Moving node {} of {} onto its connection with {}",
                        index,
                        self.name,
                        peer
                    );
                    nodes[index].coord = point;
                    claimed[index] = true;
                }
                Some(_) => {
                    tracing::debug!(
                        "Dropping node for {} on {} at {:.6}: too close to an existing node",
                        peer,
                        self.name,
                        position
                    );
                }
                None => {
                    nodes.push(NodeStop {
                        position,
                        coord: point,
                    });
                    claimed.push(true);
                }
            }
        }

        nodes.sort_by(|a, b| a.position.total_cmp(&b.position));
        self.nodes = nodes;
        &self.nodes
    }

    /// Cut the track at its nodes into consecutive paths.
    ///
    /// Paths are registered through `registry` so a segment seen twice is
    /// shared. A split that fails even after recovery is logged and the
    /// unsplit remainder stands in for that segment. Runs once.
    pub fn segment(
        &mut self,
        table: &ConnectionTable,
        registry: &mut PathRegistry,
        config: &Config,
    ) -> &[Arc<Path>] {
        if !self.paths.is_empty() {
            return &self.paths;
        }
        self.build_nodes(table, config);

        let tolerance = config.snap_tolerance_deg();
        let last = self.nodes.len().saturating_sub(1);
        let mut remainder = self.geometry.clone();
        let mut paths = Vec::with_capacity(last);

        for index in 1..self.nodes.len() {
            let origin = self.nodes[index - 1];
            let destination = self.nodes[index];
            let name = format!("{}_{}_{}", index - 1, index, self.name);

            // The last node is the end of the line and never splits
            let geometry = if index < last {
                match split_at_node(&remainder, destination.coord, tolerance) {
                    Ok((head, tail)) => {
                        remainder = tail;
                        head
                    }
                    Err(err) => {
                        tracing::warn!("Unable to split track for {}: {}", name, err);
                        remainder.clone()
                    }
                }
            } else {
                remainder.clone()
            };

            paths.push(registry.get_or_create(NewPath {
                name,
                track: self.name.clone(),
                geometry,
                origin: origin.key(),
                destination: destination.key(),
            }));
        }

        tracing::debug!("Segmented {} into {} paths", self.name, paths.len());
        self.paths = paths;
        &self.paths
    }
}

/// Collapse an out-and-back recording to its first half.
///
/// Returns the geometry to keep and whether it was collapsed.
fn normalize(name: &str, line: LineString<f64>, config: &Config) -> (LineString<f64>, bool) {
    let tolerance = config.snap_tolerance_deg();
    let half = geometry::line_length(&line) / 2.0;
    let Some(midpoint) = geometry::interpolate(&line, half) else {
        return (line, false);
    };

    let (first, second) = match geometry::snap_split(&line, midpoint, tolerance) {
        Ok(halves) => halves,
        Err(err) => {
            tracing::warn!("Unable to snap track {} at its midpoint: {}", name, err);
            return (line, false);
        }
    };

    if geometry::coincidence_ratio(&first, &second, tolerance) > config.double_back_ratio {
        (first, true)
    } else {
        (line, false)
    }
}

/// Split `line` at `node`, recovering from tolerance failures once.
///
/// A node landing on the start of the line is nudged 1.1 tolerances along
/// it, which leaves a short segment and carries the rest forward. A node
/// out of reach is replaced by its projection onto the line.
fn split_at_node(
    line: &LineString<f64>,
    node: Coord<f64>,
    tolerance: f64,
) -> Result<(LineString<f64>, LineString<f64>), GeometryError> {
    match geometry::snap_split(line, node, tolerance) {
        Ok(halves) => Ok(halves),
        Err(GeometryError::AtLineStart { .. }) => {
            tracing::debug!("Making mini segment at ({}, {})", node.x, node.y);
            let nudged = geometry::interpolate(line, tolerance * 1.1).unwrap_or(node);
            geometry::snap_split(line, geometry::closest_point(line, nudged), tolerance)
        }
        Err(GeometryError::SnapFailed { .. }) => {
            geometry::snap_split(line, geometry::closest_point(line, node), tolerance)
        }
        Err(err) => Err(err),
    }
}
