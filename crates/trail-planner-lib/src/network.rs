//! TrailNetwork - one planning run from raw recordings to the trail graph
//!
//! The network owns every piece of run state: loaded tracks, the connection
//! table, the path registry and the assembled graph. Two networks never share
//! paths.

use crate::source::within_radius;
use crate::{
    Config, ConnectionTable, PathRegistry, RawTrack, Result, RouteOptimizer, Track,
    TrackLoadError, TrackSource, TrailGraph,
};
use geo::Coord;
use rayon::prelude::*;
use std::collections::HashSet;

/// Outcome of loading recordings into a network
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Number of tracks loaded
    pub loaded: usize,
    /// Recordings that failed to load, with the reason
    pub skipped: Vec<(String, TrackLoadError)>,
    /// Tracks removed by the search radius filter
    pub filtered_out: usize,
}

impl LoadReport {
    /// True if every recording loaded
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Tracks, connections, paths and graph for one planning run
#[derive(Debug)]
pub struct TrailNetwork {
    config: Config,
    tracks: Vec<Track>,
    report: LoadReport,
    connections: ConnectionTable,
    registry: PathRegistry,
    graph: TrailGraph,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrailNetwork {
    /// Load every recording of `source` in parallel.
    ///
    /// A recording that fails to load is logged and recorded in the
    /// [`LoadReport`]; only failing to list the source aborts.
    pub fn load(source: &dyn TrackSource, config: Config) -> Result<Self> {
        #[cfg(feature = "profiling")]
        profiling::scope!("network::load");

        let identifiers = source.identifiers()?;
        tracing::info!("Loading {} track recordings", identifiers.len());

        let results: Vec<(String, std::result::Result<Track, TrackLoadError>)> = identifiers
            .into_par_iter()
            .map(|identifier| {
                let track = source
                    .load_track(&identifier)
                    .and_then(|raw| Track::new(raw, &config));
                (identifier, track)
            })
            .collect();

        Ok(Self::from_results(results, config))
    }

    /// Build a network from recordings already in memory
    pub fn from_raw_tracks(raw_tracks: Vec<RawTrack>, config: Config) -> Self {
        let results = raw_tracks
            .into_par_iter()
            .map(|raw| {
                let identifier = raw.identifier.clone();
                (identifier, Track::new(raw, &config))
            })
            .collect();
        Self::from_results(results, config)
    }

    fn from_results(
        results: Vec<(String, std::result::Result<Track, TrackLoadError>)>,
        config: Config,
    ) -> Self {
        let mut report = LoadReport::default();
        let mut names: HashSet<String> = HashSet::new();
        let mut tracks = Vec::with_capacity(results.len());

        for (identifier, result) in results {
            let error = match result {
                Ok(track) if names.insert(track.name().to_string()) => {
                    tracks.push(track);
                    continue;
                }
                Ok(track) => TrackLoadError::DuplicateName {
                    identifier: identifier.clone(),
                    name: track.name().to_string(),
                },
                Err(err) => err,
            };
            tracing::warn!("Skipping track {}: {}", identifier, error);
            report.skipped.push((identifier, error));
        }

        report.loaded = tracks.len();
        tracing::info!(
            "Loaded {} tracks ({} skipped)",
            report.loaded,
            report.skipped.len()
        );

        Self {
            registry: PathRegistry::with_scale(config.km_per_degree),
            config,
            tracks,
            report,
            connections: ConnectionTable::new(),
            graph: TrailGraph::new(),
        }
    }

    /// Keep only tracks passing within `radius_km` of `center` (lon, lat).
    ///
    /// Call before [`TrailNetwork::build`]. Returns the number removed.
    pub fn retain_within(&mut self, center: Coord<f64>, radius_km: f64) -> usize {
        let before = self.tracks.len();
        let config = &self.config;
        self.tracks
            .retain(|track| within_radius(track, center, radius_km, config));

        let removed = before - self.tracks.len();
        self.report.filtered_out += removed;
        tracing::info!(
            "{} of {} tracks within {} km of ({}, {})",
            self.tracks.len(),
            before,
            radius_km,
            center.y,
            center.x
        );
        removed
    }

    /// Detect connections between every pair of tracks
    pub fn connect_tracks(&mut self) -> &ConnectionTable {
        self.connections = ConnectionTable::detect(&self.tracks, &self.config);
        &self.connections
    }

    /// Segment every track at its nodes and assemble the trail graph
    pub fn create_network(&mut self) -> &TrailGraph {
        for track in &mut self.tracks {
            track.segment(&self.connections, &mut self.registry, &self.config);
        }
        tracing::info!(
            "Segmented {} tracks into {} paths",
            self.tracks.len(),
            self.registry.len()
        );

        self.graph = TrailGraph::from_tracks(&self.tracks);
        &self.graph
    }

    /// Connect tracks then assemble the graph
    pub fn build(&mut self) -> &TrailGraph {
        self.connect_tracks();
        self.create_network()
    }

    /// Optimizer over this network's graph, honoring the configured time limit
    pub fn optimizer(&self) -> RouteOptimizer<'_> {
        RouteOptimizer::from_config(&self.graph, &self.config)
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|track| track.name() == name)
    }

    #[inline]
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    #[inline]
    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    #[inline]
    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    #[inline]
    pub fn graph(&self) -> &TrailGraph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, line_string};

    fn raw(name: &str, geometry: LineString<f64>) -> RawTrack {
        RawTrack {
            identifier: name.to_lowercase(),
            name: name.to_string(),
            geometry,
        }
    }

    #[test]
    fn test_crossing_tracks_share_a_node() {
        let mut network = TrailNetwork::from_raw_tracks(
            vec![
                raw("Ridge", line_string![(x: 0.0, y: 0.0), (x: 0.02, y: 0.0)]),
                raw("Creek", line_string![(x: 0.01, y: -0.01), (x: 0.01, y: 0.01)]),
            ],
            Config::default(),
        );
        let graph = network.build();

        // Each track is split once at the shared crossing
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.component_count(), 1);
        assert_eq!(network.connections().len(), 1);
        assert_eq!(network.registry().len(), 4);
    }

    #[test]
    fn test_duplicate_names_are_skipped() {
        let network = TrailNetwork::from_raw_tracks(
            vec![
                raw("Ridge", line_string![(x: 0.0, y: 0.0), (x: 0.02, y: 0.0)]),
                RawTrack {
                    identifier: "ridge-copy".to_string(),
                    ..raw("Ridge", line_string![(x: 1.0, y: 0.0), (x: 1.02, y: 0.0)])
                },
            ],
            Config::default(),
        );
        assert_eq!(network.report().loaded, 1);
        assert!(matches!(
            network.report().skipped.as_slice(),
            [(_, TrackLoadError::DuplicateName { .. })]
        ));
    }

    #[test]
    fn test_bad_recordings_do_not_abort() {
        let network = TrailNetwork::from_raw_tracks(
            vec![
                raw("Ridge", line_string![(x: 0.0, y: 0.0), (x: 0.02, y: 0.0)]),
                raw("Dot", line_string![(x: 0.5, y: 0.5)]),
            ],
            Config::default(),
        );
        assert_eq!(network.tracks().len(), 1);
        assert!(!network.report().is_clean());
        assert!(network.track("Ridge").is_some());
    }

    #[test]
    fn test_retain_within_radius() {
        let mut network = TrailNetwork::from_raw_tracks(
            vec![
                raw("Near", line_string![(x: 0.0, y: 0.0), (x: 0.02, y: 0.0)]),
                raw("Far", line_string![(x: 2.0, y: 2.0), (x: 2.02, y: 2.0)]),
            ],
            Config::default(),
        );
        let removed = network.retain_within(Coord { x: 0.0, y: 0.0 }, 10.0);
        assert_eq!(removed, 1);
        assert_eq!(network.report().filtered_out, 1);
        assert!(network.track("Far").is_none());
    }

    #[test]
    fn test_disjoint_tracks_form_separate_components() {
        let mut network = TrailNetwork::from_raw_tracks(
            vec![
                raw("West", line_string![(x: 0.0, y: 0.0), (x: 0.02, y: 0.0)]),
                raw("East", line_string![(x: 1.0, y: 0.0), (x: 1.02, y: 0.0)]),
            ],
            Config::default(),
        );
        let graph = network.build();
        assert_eq!(graph.component_count(), 2);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_gapped_t_junction_is_connected() {
        // The spur starts about 30 m short of the main trail's midpoint
        let mut network = TrailNetwork::from_raw_tracks(
            vec![
                raw("Main", line_string![(x: 0.0, y: 0.0), (x: 0.018, y: 0.0)]),
                raw("Spur", line_string![(x: 0.009, y: 0.00027), (x: 0.009, y: 0.01)]),
            ],
            Config::default(),
        );
        let graph = network.build();

        assert_eq!(graph.component_count(), 1);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(network.connections().len(), 1);
    }

    #[test]
    fn test_end_to_end_gap_is_connected() {
        let mut network = TrailNetwork::from_raw_tracks(
            vec![
                raw("First", line_string![(x: 0.0, y: 0.0), (x: 0.018, y: 0.0)]),
                raw("Second", line_string![(x: 0.01827, y: 0.0), (x: 0.03, y: 0.0)]),
            ],
            Config::default(),
        );
        let graph = network.build();

        assert_eq!(graph.component_count(), 1);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }
}
