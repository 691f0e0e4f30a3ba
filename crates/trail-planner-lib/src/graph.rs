//! Undirected trail graph assembled from track paths

use crate::{Path, PathHash, Track};
use crate::utils::NodeKey;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Nodes keyed by exact coordinate, edges carrying their [`Path`].
///
/// Each edge is stored with its path's origin as source and destination as
/// target, so "forward" always means origin to destination. Parallel edges
/// between the same nodes (different tracks) are kept.
#[derive(Clone, Debug, Default)]
pub struct TrailGraph {
    graph: UnGraph<NodeKey, Arc<Path>>,
    indices: HashMap<NodeKey, NodeIndex>,
    /// Dense connected-component id per node index
    components: Vec<usize>,
    component_count: usize,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrailGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble the graph from the segmented paths of every track
    pub fn from_tracks(tracks: &[Track]) -> Self {
        Self::from_paths(tracks.iter().flat_map(|track| track.paths().iter()))
    }

    /// Assemble the graph from paths; a path identity seen twice is added once
    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a Arc<Path>>) -> Self {
        let mut graph = Self::new();
        let mut seen: HashSet<PathHash> = HashSet::new();
        for path in paths {
            if seen.insert(path.hash()) {
                graph.add_path(path.clone());
            }
        }
        graph.compute_components();

        tracing::info!(
            "Trail graph: {} nodes, {} edges, {} components, {:.2} km",
            graph.node_count(),
            graph.edge_count(),
            graph.component_count,
            graph.total_distance()
        );
        graph
    }

    fn add_node(&mut self, key: NodeKey) -> NodeIndex {
        if let Some(&index) = self.indices.get(&key) {
            return index;
        }
        let index = self.graph.add_node(key);
        self.indices.insert(key, index);
        index
    }

    fn add_path(&mut self, path: Arc<Path>) -> EdgeIndex {
        let origin = self.add_node(path.origin());
        let destination = self.add_node(path.destination());
        self.graph.add_edge(origin, destination, path)
    }

    fn compute_components(&mut self) {
        let mut uf = UnionFind::<usize>::new(self.graph.node_count());
        for edge in self.graph.edge_references() {
            uf.union(edge.source().index(), edge.target().index());
        }

        // Relabel representatives densely in node order
        let mut dense: HashMap<usize, usize> = HashMap::new();
        self.components = uf
            .into_labeling()
            .into_iter()
            .map(|root| {
                let next = dense.len();
                *dense.entry(root).or_insert(next)
            })
            .collect();
        self.component_count = dense.len();
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    /// Node keys in index order
    pub fn nodes(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.graph.node_indices().map(|index| self.graph[index])
    }

    #[inline]
    pub fn node_index(&self, key: NodeKey) -> Option<NodeIndex> {
        self.indices.get(&key).copied()
    }

    #[inline]
    pub fn node_key(&self, index: NodeIndex) -> Option<NodeKey> {
        self.graph.node_weight(index).copied()
    }

    /// Every edge as `(origin, destination, path)`
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &Arc<Path>)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target(), edge.weight()))
    }

    /// Paths incident to a node
    pub fn paths_at(&self, key: NodeKey) -> Vec<&Arc<Path>> {
        self.node_index(key)
            .map(|index| self.graph.edges(index).map(|edge| edge.weight()).collect())
            .unwrap_or_default()
    }

    /// Connected component of a node
    #[inline]
    pub fn component_of(&self, index: NodeIndex) -> Option<usize> {
        self.components.get(index.index()).copied()
    }

    #[inline]
    pub fn component_count(&self) -> usize {
        self.component_count
    }

    /// Total length of all edges in kilometers
    pub fn total_distance(&self) -> f64 {
        self.graph.edge_weights().map(|path| path.distance()).sum()
    }

    /// The underlying petgraph graph
    #[inline]
    pub fn inner(&self) -> &UnGraph<NodeKey, Arc<Path>> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewPath, PathRegistry, geometry};
    use geo::coord;

    fn register(
        registry: &mut PathRegistry,
        track: &str,
        a: (f64, f64),
        b: (f64, f64),
    ) -> Arc<Path> {
        let (a, b) = (coord! { x: a.0, y: a.1 }, coord! { x: b.0, y: b.1 });
        registry.get_or_create(NewPath {
            name: format!("0_1_{track}"),
            track: track.to_string(),
            geometry: geometry::segment_line(a, b),
            origin: a.into(),
            destination: b.into(),
        })
    }

    #[test]
    fn test_shared_nodes_are_merged() {
        let mut registry = PathRegistry::new();
        let paths = vec![
            register(&mut registry, "A", (0.0, 0.0), (0.01, 0.0)),
            register(&mut registry, "B", (0.01, 0.0), (0.01, 0.01)),
        ];
        let graph = TrailGraph::from_paths(&paths);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.component_count(), 1);
        assert_eq!(graph.paths_at(NodeKey::new(0.01, 0.0)).len(), 2);
    }

    #[test]
    fn test_parallel_edges_are_kept() {
        let mut registry = PathRegistry::new();
        let paths = vec![
            register(&mut registry, "A", (0.0, 0.0), (0.01, 0.0)),
            register(&mut registry, "B", (0.0, 0.0), (0.01, 0.0)),
        ];
        let graph = TrailGraph::from_paths(&paths);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_duplicate_path_added_once() {
        let mut registry = PathRegistry::new();
        let path = register(&mut registry, "A", (0.0, 0.0), (0.01, 0.0));
        let graph = TrailGraph::from_paths(&[path.clone(), path]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_components_are_dense() {
        let mut registry = PathRegistry::new();
        let paths = vec![
            register(&mut registry, "A", (0.0, 0.0), (0.01, 0.0)),
            register(&mut registry, "B", (1.0, 1.0), (1.01, 1.0)),
            register(&mut registry, "C", (0.01, 0.0), (0.02, 0.0)),
        ];
        let graph = TrailGraph::from_paths(&paths);
        assert_eq!(graph.component_count(), 2);

        let a = graph.node_index(NodeKey::new(0.0, 0.0)).unwrap();
        let c = graph.node_index(NodeKey::new(0.02, 0.0)).unwrap();
        let b = graph.node_index(NodeKey::new(1.0, 1.0)).unwrap();
        assert_eq!(graph.component_of(a), graph.component_of(c));
        assert_ne!(graph.component_of(a), graph.component_of(b));
        for index in graph.inner().node_indices() {
            assert!(graph.component_of(index).unwrap() < 2);
        }
    }

    #[test]
    fn test_edges_follow_path_orientation() {
        let mut registry = PathRegistry::new();
        let path = register(&mut registry, "A", (0.01, 0.0), (0.0, 0.0));
        let graph = TrailGraph::from_paths(&[path.clone()]);
        let (origin, destination, weight) = graph.edges().next().unwrap();
        assert_eq!(graph.node_key(origin), Some(path.origin()));
        assert_eq!(graph.node_key(destination), Some(path.destination()));
        assert!(Arc::ptr_eq(weight, &path));
        assert!((graph.total_distance() - 0.01 * 111.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_graph() {
        let graph = TrailGraph::from_paths(std::iter::empty());
        assert!(graph.is_empty());
        assert_eq!(graph.component_count(), 0);
    }
}
