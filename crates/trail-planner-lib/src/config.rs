//! Planning configuration shared by the graph builder and the optimizer

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Approximate number of kilometers per degree of latitude/longitude.
///
/// Distances are computed in degree space and scaled by this constant. It is
/// not geodesically exact: east-west distances shrink with latitude, which only
/// affects tolerances and route-length accounting, never connectivity.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Default snap tolerance (about 1e-4 degrees)
pub const DEFAULT_SNAP_TOLERANCE_KM: f64 = 0.0111;

/// Default maximum gap between two tracks for them to be connected
pub const DEFAULT_INTERSECTION_TOLERANCE_KM: f64 = 0.1;

/// Configuration for one planning run
///
/// All distances are in kilometers. Geometric comparisons convert them to
/// degrees once through [`Config::km_to_degrees`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Degrees-to-kilometers scale factor (default [`KM_PER_DEGREE`])
    pub km_per_degree: f64,
    /// Distance within which two points are treated as coincident when
    /// snapping, splitting and deduplicating nodes
    pub snap_tolerance_km: f64,
    /// Maximum gap between two tracks for them to share a connection node
    pub intersection_tolerance_km: f64,
    /// Fraction of first-half segments that must coincide with the second
    /// half for a track to be treated as an out-and-back recording
    pub double_back_ratio: f64,
    /// Run pairwise intersection detection on the rayon thread pool
    pub parallel_detection: bool,
    /// Wall-clock budget for one MILP solve (`None` = unlimited)
    pub solver_time_limit: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            km_per_degree: KM_PER_DEGREE,
            snap_tolerance_km: DEFAULT_SNAP_TOLERANCE_KM,
            intersection_tolerance_km: DEFAULT_INTERSECTION_TOLERANCE_KM,
            double_back_ratio: 0.5,
            parallel_detection: true,
            solver_time_limit: None,
        }
    }
}

impl Config {
    /// Convert a length in kilometers to degrees
    #[inline]
    pub fn km_to_degrees(&self, km: f64) -> f64 {
        km / self.km_per_degree
    }

    /// Convert a length in degrees to kilometers
    #[inline]
    pub fn degrees_to_km(&self, degrees: f64) -> f64 {
        degrees * self.km_per_degree
    }

    /// Snap tolerance in degrees, the unit of all stored geometry
    #[inline]
    pub fn snap_tolerance_deg(&self) -> f64 {
        self.km_to_degrees(self.snap_tolerance_km)
    }

    /// Builder-style setter for the solver time limit
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.solver_time_limit = Some(limit);
        self
    }
}
