//! Pairwise intersection detection between tracks
//!
//! A connection is a single fact per unordered track pair: the coordinate
//! where the two tracks meet. Tracks look their peers up here instead of
//! holding references to each other.

use crate::{Config, Track, geometry};
use geo::{Coord, Rect};
use rayon::prelude::*;
use std::collections::HashMap;

/// A shared node between two tracks
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    /// Track the node was measured on
    pub first: String,
    /// Peer track
    pub second: String,
    /// Connection coordinate (nearest point on `first`)
    pub node: Coord<f64>,
    /// Gap between the two tracks in kilometers
    pub distance_km: f64,
}

impl Connection {
    /// The other track of this connection, if `track` is part of it
    pub fn peer_of(&self, track: &str) -> Option<&str> {
        if self.first == track {
            Some(&self.second)
        } else if self.second == track {
            Some(&self.first)
        } else {
            None
        }
    }
}

/// Connection facts for one planning run, keyed by unordered track pair
#[derive(Clone, Debug, Default)]
pub struct ConnectionTable {
    connections: Vec<Connection>,
    by_pair: HashMap<(String, String), usize>,
    by_track: HashMap<String, Vec<usize>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn pair_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    /// Record a connection, replacing any earlier one for the same pair
    pub fn record(&mut self, connection: Connection) {
        let key = Self::pair_key(&connection.first, &connection.second);
        if let Some(&index) = self.by_pair.get(&key) {
            self.connections[index] = connection;
            return;
        }

        let index = self.connections.len();
        self.by_track
            .entry(connection.first.clone())
            .or_default()
            .push(index);
        if connection.second != connection.first {
            self.by_track
                .entry(connection.second.clone())
                .or_default()
                .push(index);
        }
        self.by_pair.insert(key, index);
        self.connections.push(connection);
    }

    /// Connection between two tracks, in either order
    pub fn get(&self, a: &str, b: &str) -> Option<&Connection> {
        self.by_pair
            .get(&Self::pair_key(a, b))
            .map(|&index| &self.connections[index])
    }

    /// Peers of `track` with their connection coordinates, in detection order
    pub fn peers(&self, track: &str) -> Vec<(&str, Coord<f64>)> {
        self.by_track
            .get(track)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|&index| {
                        let connection = &self.connections[index];
                        connection
                            .peer_of(track)
                            .map(|peer| (peer, connection.node))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Test every unordered pair of tracks and record their connections.
    ///
    /// Pair tests may run on the rayon pool; results are merged in pair order
    /// so the table is identical either way.
    pub fn detect(tracks: &[Track], config: &Config) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("connections::detect");

        let pairs: Vec<(usize, usize)> = (0..tracks.len())
            .flat_map(|i| ((i + 1)..tracks.len()).map(move |j| (i, j)))
            .collect();

        let test = |&(i, j): &(usize, usize)| {
            detect_intersection(
                &tracks[i],
                &tracks[j],
                config.intersection_tolerance_km,
                config,
            )
        };
        let found: Vec<Option<Connection>> = if config.parallel_detection {
            pairs.par_iter().map(test).collect()
        } else {
            pairs.iter().map(test).collect()
        };

        let mut table = Self::new();
        for connection in found.into_iter().flatten() {
            table.record(connection);
        }

        tracing::info!(
            "Joined {} tracks with {} connections ({} pairs tested)",
            tracks.len(),
            table.len(),
            pairs.len()
        );
        table
    }
}

/// Gap between two rectangles (0 when they overlap)
fn rect_gap(a: Rect<f64>, b: Rect<f64>) -> f64 {
    let dx = (a.min().x - b.max().x).max(b.min().x - a.max().x).max(0.0);
    let dy = (a.min().y - b.max().y).max(b.min().y - a.max().y).max(0.0);
    dx.hypot(dy)
}

/// Connection point between two tracks if they come within `tolerance_km`
///
/// The returned node lies on track `a`.
pub fn detect_intersection(
    a: &Track,
    b: &Track,
    tolerance_km: f64,
    config: &Config,
) -> Option<Connection> {
    // Cheap reject before the segment-pair scan
    if config.degrees_to_km(rect_gap(a.bounding_rect(), b.bounding_rect())) >= tolerance_km {
        return None;
    }

    let nearest = geometry::nearest_points(a.geometry(), b.geometry())?;
    let distance_km = config.degrees_to_km(nearest.distance);
    if distance_km >= tolerance_km {
        return None;
    }

    tracing::debug!(
        "Connecting {} and {} at ({}, {}), gap {:.4} km",
        a.name(),
        b.name(),
        nearest.on_a.x,
        nearest.on_a.y,
        distance_km
    );
    Some(Connection {
        first: a.name().to_string(),
        second: b.name().to_string(),
        node: nearest.on_a,
        distance_km,
    })
}
