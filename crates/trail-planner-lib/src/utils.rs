//! Utility functions for coordinate keys and conversions

use geo::{Coord, Distance, Euclidean, Point};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Maximum absolute latitude in degrees
pub const MAX_LATITUDE: f64 = 90.0;

/// Maximum absolute longitude in degrees
pub const MAX_LONGITUDE: f64 = 180.0;

/// A graph node identified by its exact coordinate value.
///
/// Two keys are equal only when both components are bit-identical, so
/// coordinates that differ by floating-point noise stay distinct nodes.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeKey {
    x: f64,
    y: f64,
}

impl NodeKey {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Longitude
    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Latitude
    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.x,
            y: self.y,
        }
    }
}

impl From<Coord<f64>> for NodeKey {
    fn from(c: Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

impl From<NodeKey> for Coord<f64> {
    fn from(key: NodeKey) -> Self {
        key.coord()
    }
}

impl PartialEq for NodeKey {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}

impl Eq for NodeKey {}

impl Hash for NodeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}

impl Ord for NodeKey {
    // total_cmp only reports Equal for identical bit patterns, matching `eq`
    fn cmp(&self, other: &Self) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

impl PartialOrd for NodeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.x, self.y)
    }
}

/// Convert a GPX waypoint to a (longitude, latitude) coordinate
#[inline(always)]
pub fn waypoint_to_coord(waypoint: &gpx::Waypoint) -> Coord<f64> {
    let point = waypoint.point();
    Coord {
        x: point.x(),
        y: point.y(),
    }
}

/// Convert a coordinate back to a GPX waypoint
#[inline(always)]
pub fn coord_to_waypoint(coord: Coord<f64>) -> gpx::Waypoint {
    gpx::Waypoint::new(Point::from(coord))
}

/// Check if a (longitude, latitude) coordinate is within WGS84 bounds
#[inline(always)]
pub fn is_valid_wgs84(coord: &Coord<f64>) -> bool {
    coord.x.is_finite()
        && coord.y.is_finite()
        && coord.x.abs() <= MAX_LONGITUDE
        && coord.y.abs() <= MAX_LATITUDE
}

/// Planar distance between two coordinates scaled to kilometers
#[inline]
pub fn scaled_distance_km(a: Coord<f64>, b: Coord<f64>, km_per_degree: f64) -> f64 {
    Euclidean.distance(&Point::from(a), &Point::from(b)) * km_per_degree
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_node_key_bit_identity() {
        let a = NodeKey::new(0.1 + 0.2, 1.0);
        let b = NodeKey::new(0.3, 1.0);
        // 0.1 + 0.2 != 0.3 in floating point, so these are different nodes
        assert_ne!(a, b);
        assert_eq!(a, NodeKey::new(0.1 + 0.2, 1.0));
    }

    #[test]
    fn test_node_key_hash_set() {
        let mut set = HashSet::new();
        set.insert(NodeKey::new(1.0, 2.0));
        set.insert(NodeKey::new(1.0, 2.0));
        set.insert(NodeKey::new(2.0, 1.0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_node_key_ordering_is_total() {
        let mut keys = vec![
            NodeKey::new(1.0, 0.0),
            NodeKey::new(0.0, 1.0),
            NodeKey::new(0.0, 0.0),
        ];
        keys.sort();
        assert_eq!(keys[0], NodeKey::new(0.0, 0.0));
        assert_eq!(keys[2], NodeKey::new(1.0, 0.0));
    }

    #[test]
    fn test_waypoint_roundtrip() {
        let coord = Coord { x: -105.25, y: 40.02 };
        let waypoint = coord_to_waypoint(coord);
        assert_eq!(waypoint_to_coord(&waypoint), coord);
    }

    #[test]
    fn test_is_valid_wgs84() {
        assert!(is_valid_wgs84(&Coord { x: 0.0, y: 0.0 }));
        assert!(!is_valid_wgs84(&Coord { x: 181.0, y: 0.0 }));
        assert!(!is_valid_wgs84(&Coord {
            x: f64::NAN,
            y: 0.0
        }));
    }

    #[test]
    fn test_scaled_distance_km() {
        let d = scaled_distance_km(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 1.0 }, 111.0);
        assert!((d - 111.0).abs() < 1e-9);
    }
}
