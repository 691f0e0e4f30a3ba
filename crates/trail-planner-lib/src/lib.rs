//! Trail Planner Library - Trail Graph Construction and Route Optimization
//!
//! This library turns a set of raw GPS track recordings into a connected trail
//! graph and selects a long, bounded-length hiking route from it with a
//! mixed-integer linear program.
//!
//! # Architecture
//!
//! - **[`Track`]**: One normalized, one-way trail line with its split nodes
//! - **[`ConnectionTable`]**: Pairwise intersection facts between tracks
//! - **[`PathRegistry`]**: Find-or-create store of deduplicated [`Path`] edges
//! - **[`TrailGraph`]**: Undirected multigraph of nodes and paths
//! - **[`TrailNetwork`]**: One planning run, from track loading to the assembled graph
//! - **[`RouteOptimizer`]**: MILP model over the graph, solved per [`RouteQuery`]
//!
//! # Data Flow
//!
//! ```text
//! GPX files -> Track::new -> ConnectionTable::detect -> Track::segment
//!           -> TrailGraph::from_tracks -> RouteOptimizer::solve -> export::write_gpx
//! ```
//!
//! # Units
//!
//! Geometry is stored in degrees (longitude, latitude). Every distance and
//! threshold exposed through the API is in kilometers, converted with the
//! constant [`Config::km_per_degree`] scale.

mod config;
mod connections;
pub mod export;
pub mod geometry;
mod graph;
mod network;
mod optimizer;
mod path;
pub mod source;
mod track;
pub mod utils;

// Public API exports
pub use config::{
    Config, DEFAULT_INTERSECTION_TOLERANCE_KM, DEFAULT_SNAP_TOLERANCE_KM, KM_PER_DEGREE,
};
pub use connections::{Connection, ConnectionTable};
pub use graph::TrailGraph;
pub use network::{LoadReport, TrailNetwork};
pub use optimizer::{RouteOptimizer, RouteOutcome, RouteQuery, RouteSolution, SelectedEdge};
pub use path::{NewPath, Path, PathHash, PathRegistry};
pub use source::{CoordinateGeocoder, Geocoder, GpxDirectory, RawTrack, TrackSource};
pub use track::{NodeStop, Track};
pub use utils::NodeKey;

use std::time::Duration;

/// Geometry failures while snapping or splitting a line within tolerance
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Point ({x}, {y}) is {distance} deg from the line, beyond tolerance {tolerance}")]
    SnapFailed {
        x: f64,
        y: f64,
        distance: f64,
        tolerance: f64,
    },

    #[error("Split point ({x}, {y}) lands on the start of the line")]
    AtLineStart { x: f64, y: f64 },

    #[error("Split point ({x}, {y}) lands on the end of the line")]
    AtLineEnd { x: f64, y: f64 },

    #[error("Degenerate line: {0}")]
    Degenerate(String),
}

/// Failures while loading a single track from a source
#[derive(Debug, thiserror::Error)]
pub enum TrackLoadError {
    #[error("IO error reading {identifier}: {source}")]
    Io {
        identifier: String,
        #[source]
        source: std::io::Error,
    },

    #[error("GPX parsing error in {identifier}: {source}")]
    GpxParse {
        identifier: String,
        #[source]
        source: gpx::errors::GpxError,
    },

    #[error("No track found in {0}")]
    NoTrack(String),

    #[error("Track {identifier} has {points} point(s), at least 2 are required")]
    TooFewPoints { identifier: String, points: usize },

    #[error("Track name {name:?} from {identifier} is already loaded")]
    DuplicateName { identifier: String, name: String },
}

/// Failures while resolving a place name to coordinates
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeocodeError {
    #[error("Unable to resolve location {0:?}")]
    Unresolvable(String),

    #[error("Coordinates ({lat}, {lon}) are out of range")]
    OutOfRange { lat: f64, lon: f64 },
}

/// Top-level error type for planning runs
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    TrackLoad(#[from] TrackLoadError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Model construction failed: {0}")]
    ModelConstruction(String),

    #[error("No feasible route: {0}")]
    InfeasibleRoute(String),

    #[error("No route found within the {0:?} solver time limit")]
    SolverTimeout(Duration),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("GPX writing error: {0}")]
    GpxWrite(#[from] gpx::errors::GpxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlannerError {
    /// True for outcomes that mean "no route for these bounds" rather than a defect
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            PlannerError::InfeasibleRoute(_) | PlannerError::SolverTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        let _: fn() -> Config = Config::default;
        let _: fn() -> PathRegistry = PathRegistry::new;
    }

    #[test]
    fn test_infeasible_errors_are_not_defects() {
        assert!(PlannerError::InfeasibleRoute("too long".into()).is_infeasible());
        assert!(PlannerError::SolverTimeout(Duration::from_secs(1)).is_infeasible());
        assert!(!PlannerError::ModelConstruction("bad".into()).is_infeasible());
    }
}
