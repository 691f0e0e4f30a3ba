//! Path segments (graph edges) and the run-scoped registry that deduplicates them

use crate::config::KM_PER_DEGREE;
use crate::geometry;
use crate::utils::NodeKey;
use geo::LineString;
use std::collections::HashMap;
use std::sync::Arc;

/// Canonical identity of a path: sorted endpoint pair plus owning track name
///
/// The hash of `(origin, destination, track)` equals the hash of
/// `(destination, origin, track)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathHash {
    low: NodeKey,
    high: NodeKey,
    track: String,
}

impl PathHash {
    pub fn new(origin: NodeKey, destination: NodeKey, track: &str) -> Self {
        let (low, high) = if origin <= destination {
            (origin, destination)
        } else {
            (destination, origin)
        };
        Self {
            low,
            high,
            track: track.to_string(),
        }
    }

    #[inline]
    pub fn endpoints(&self) -> (NodeKey, NodeKey) {
        (self.low, self.high)
    }

    #[inline]
    pub fn track(&self) -> &str {
        &self.track
    }
}

/// An immutable line segment between two nodes, belonging to one track
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    /// `"{from_index}_{to_index}_{track}"`
    name: String,
    /// Name of the owning track
    track: String,
    /// Segment geometry, oriented from `origin` to `destination`
    geometry: LineString<f64>,
    origin: NodeKey,
    destination: NodeKey,
    /// Length in kilometers
    distance: f64,
}

impl Path {
    fn new(request: NewPath, km_per_degree: f64) -> Self {
        let distance = geometry::line_length(&request.geometry) * km_per_degree;
        Self {
            name: request.name,
            track: request.track,
            geometry: request.geometry,
            origin: request.origin,
            destination: request.destination,
            distance,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn track(&self) -> &str {
        &self.track
    }

    #[inline]
    pub fn origin(&self) -> NodeKey {
        self.origin
    }

    #[inline]
    pub fn destination(&self) -> NodeKey {
        self.destination
    }

    /// Length in kilometers
    #[inline]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    #[inline]
    pub fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    pub fn hash(&self) -> PathHash {
        PathHash::new(self.origin, self.destination, &self.track)
    }

    /// Distance signed by traversal direction: positive from origin to
    /// destination, negative the other way round
    pub fn signed_distance(&self, from: NodeKey, to: NodeKey) -> Option<f64> {
        if from == self.origin && to == self.destination {
            Some(self.distance)
        } else if from == self.destination && to == self.origin {
            Some(-self.distance)
        } else {
            None
        }
    }

    /// Geometry oriented to start at `from`
    pub fn geometry_from(&self, from: NodeKey) -> LineString<f64> {
        if from == self.destination && from != self.origin {
            geometry::reversed(&self.geometry)
        } else {
            self.geometry.clone()
        }
    }
}

/// Everything needed to register a path
#[derive(Clone, Debug)]
pub struct NewPath {
    pub name: String,
    pub track: String,
    pub geometry: LineString<f64>,
    pub origin: NodeKey,
    pub destination: NodeKey,
}

/// Find-or-create store of paths, owned by one planning run
///
/// At most one [`Path`] exists per [`PathHash`]. Registering the same hash
/// with identical geometry returns the existing instance; different geometry
/// replaces the stale entry.
#[derive(Debug, Clone)]
pub struct PathRegistry {
    paths: HashMap<PathHash, Arc<Path>>,
    km_per_degree: f64,
}

impl Default for PathRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::with_scale(KM_PER_DEGREE)
    }

    /// Registry computing path distances with a custom degrees-to-km scale
    pub fn with_scale(km_per_degree: f64) -> Self {
        Self {
            paths: HashMap::new(),
            km_per_degree,
        }
    }

    /// Return the registered path for this identity, creating it if needed
    pub fn get_or_create(&mut self, request: NewPath) -> Arc<Path> {
        let hash = PathHash::new(request.origin, request.destination, &request.track);

        if let Some(existing) = self.paths.get(&hash) {
            if existing.geometry == request.geometry {
                return existing.clone();
            }
            tracing::debug!(
                "Replacing path {} ({} -> {}) with new geometry",
                existing.name,
                existing.origin,
                existing.destination
            );
        }

        let path = Arc::new(Path::new(request, self.km_per_degree));
        self.paths.insert(hash, path.clone());
        path
    }

    /// Look up a path by identity
    #[inline]
    pub fn get(&self, hash: &PathHash) -> Option<&Arc<Path>> {
        self.paths.get(hash)
    }

    /// Look up a path by endpoints in either order
    pub fn lookup(&self, origin: NodeKey, destination: NodeKey, track: &str) -> Option<&Arc<Path>> {
        self.paths.get(&PathHash::new(origin, destination, track))
    }

    /// Signed distance for traversing the identified path from `from` to `to`
    pub fn signed_distance(&self, from: NodeKey, to: NodeKey, track: &str) -> Option<f64> {
        self.lookup(from, to, track)?.signed_distance(from, to)
    }

    /// All registered paths, in canonical hash order
    pub fn paths(&self) -> Vec<Arc<Path>> {
        let mut entries: Vec<(&PathHash, &Arc<Path>)> = self.paths.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, path)| path.clone()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Total length of all registered paths in kilometers
    pub fn total_distance(&self) -> f64 {
        self.paths.values().map(|p| p.distance).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    fn request(name: &str, geometry: LineString<f64>) -> NewPath {
        let origin = NodeKey::from(geometry.0[0]);
        let destination = NodeKey::from(*geometry.0.last().unwrap());
        NewPath {
            name: name.to_string(),
            track: "Mesa Trail".to_string(),
            geometry,
            origin,
            destination,
        }
    }

    #[test]
    fn test_hash_symmetry() {
        let a = NodeKey::new(-105.28, 39.98);
        let b = NodeKey::new(-105.27, 39.99);
        assert_eq!(PathHash::new(a, b, "Mesa"), PathHash::new(b, a, "Mesa"));
        assert_ne!(PathHash::new(a, b, "Mesa"), PathHash::new(a, b, "Bear Peak"));
    }

    #[test]
    fn test_idempotent_registration() {
        let mut registry = PathRegistry::new();
        let line = line_string![(x: 0.0, y: 0.0), (x: 0.01, y: 0.0)];

        let first = registry.get_or_create(request("0_1_Mesa Trail", line.clone()));
        let second = registry.get_or_create(request("0_1_Mesa Trail", line));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.distance(), second.distance());
        assert_eq!(first.hash(), second.hash());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reversed_request_reuses_identity() {
        let mut registry = PathRegistry::new();
        let line = line_string![(x: 0.0, y: 0.0), (x: 0.01, y: 0.0)];
        let forward = registry.get_or_create(request("0_1_Mesa Trail", line.clone()));

        let mut reverse = request("0_1_Mesa Trail", line);
        std::mem::swap(&mut reverse.origin, &mut reverse.destination);
        let again = registry.get_or_create(reverse);

        assert!(Arc::ptr_eq(&forward, &again));
    }

    #[test]
    fn test_stale_geometry_is_replaced() {
        let mut registry = PathRegistry::new();
        let straight = line_string![(x: 0.0, y: 0.0), (x: 0.01, y: 0.0)];
        let bent = line_string![(x: 0.0, y: 0.0), (x: 0.005, y: 0.002), (x: 0.01, y: 0.0)];

        let old = registry.get_or_create(request("0_1_Mesa Trail", straight));
        let new = registry.get_or_create(request("0_1_Mesa Trail", bent.clone()));

        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(new.geometry(), &bent);
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(registry.get(&new.hash()).unwrap(), &new));
    }

    #[test]
    fn test_distance_is_scaled_to_km() {
        let mut registry = PathRegistry::new();
        let path = registry.get_or_create(request(
            "0_1_Mesa Trail",
            line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 0.5)],
        ));
        assert!((path.distance() - 55.5).abs() < 1e-9);
        assert!((registry.total_distance() - 55.5).abs() < 1e-9);
    }

    #[test]
    fn test_signed_distance() {
        let mut registry = PathRegistry::new();
        let path = registry.get_or_create(request(
            "0_1_Mesa Trail",
            line_string![(x: 0.0, y: 0.0), (x: 0.01, y: 0.0)],
        ));
        let (o, d) = (path.origin(), path.destination());
        assert_eq!(registry.signed_distance(o, d, "Mesa Trail"), Some(path.distance()));
        assert_eq!(registry.signed_distance(d, o, "Mesa Trail"), Some(-path.distance()));
        assert_eq!(registry.signed_distance(o, d, "Other"), None);
    }

    #[test]
    fn test_geometry_from_destination_is_reversed() {
        let mut registry = PathRegistry::new();
        let path = registry.get_or_create(request(
            "0_1_Mesa Trail",
            line_string![(x: 0.0, y: 0.0), (x: 0.005, y: 0.001), (x: 0.01, y: 0.0)],
        ));
        let rev = path.geometry_from(path.destination());
        assert_eq!(rev.0[0], path.destination().coord());
        assert_eq!(*rev.0.last().unwrap(), path.origin().coord());
    }
}
