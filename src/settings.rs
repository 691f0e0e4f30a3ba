use crate::entrypoints::cli::{get_env, parse_args};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use trail_planner_lib::{Config, RouteQuery};

/// Environment fallback for `--time-limit-secs`
pub const TIME_LIMIT_ENV: &str = "TRAIL_PLANNER_TIME_LIMIT_SECS";

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("Invalid arguments: {0}")]
    Invalid(String),

    #[error("Cannot read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Trail Planner - Build a trail graph from GPX tracks and plan the longest route within a distance window
pub struct Settings {
    /// Directory containing the .gpx recordings to load
    #[clap(short, long, value_name = "DIR")]
    pub tracks_dir: PathBuf,

    /// Center of the search area as "lat,lon" (requires --radius-km)
    #[clap(short, long, requires = "radius_km")]
    pub location: Option<String>,

    /// Only keep tracks with a point within this many km of --location
    #[clap(short, long)]
    pub radius_km: Option<f64>,

    /// Minimum route length in km
    #[clap(long, default_value = "0")]
    pub min_km: f64,

    /// Maximum route length in km
    #[clap(long, default_value = "30")]
    pub max_km: f64,

    /// Maximum number of disconnected trail systems the route may use
    #[clap(short, long, default_value = "1")]
    pub unique_starts: usize,

    /// Solver time limit in seconds (falls back to TRAIL_PLANNER_TIME_LIMIT_SECS)
    #[clap(long)]
    pub time_limit_secs: Option<u64>,

    /// Maximum gap in km between two tracks for them to be connected
    #[clap(long)]
    pub intersection_tolerance_km: Option<f64>,

    /// Where to write the planned route
    #[clap(short, long, value_name = "FILE", default_value = "route.gpx")]
    pub output: PathBuf,

    /// JSON file with planner configuration (flags take precedence)
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Settings {
    /// Parse the process arguments, exiting with usage on failure
    pub fn from_cli() -> Self {
        match parse_args::<Settings>() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Check value ranges clap cannot express
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.min_km.is_finite() || !self.max_km.is_finite() {
            return Err(SettingsError::Invalid(
                "--min-km and --max-km must be finite".to_string(),
            ));
        }
        if self.min_km < 0.0 {
            return Err(SettingsError::Invalid(format!(
                "--min-km must not be negative, got {}",
                self.min_km
            )));
        }
        if self.min_km > self.max_km {
            return Err(SettingsError::Invalid(format!(
                "--min-km ({}) is greater than --max-km ({})",
                self.min_km, self.max_km
            )));
        }
        if self.unique_starts < 1 {
            return Err(SettingsError::Invalid(
                "--unique-starts must be at least 1".to_string(),
            ));
        }
        if let Some(radius) = self.radius_km {
            if !(radius > 0.0 && radius.is_finite()) {
                return Err(SettingsError::Invalid(format!(
                    "--radius-km must be positive, got {}",
                    radius
                )));
            }
        }
        if let Some(tolerance) = self.intersection_tolerance_km {
            if !(tolerance >= 0.0 && tolerance.is_finite()) {
                return Err(SettingsError::Invalid(format!(
                    "--intersection-tolerance-km must not be negative, got {}",
                    tolerance
                )));
            }
        }
        Ok(())
    }

    /// Planner configuration: the JSON file (or defaults) with flag overrides applied
    pub fn config(&self) -> Result<Config, SettingsError> {
        let mut config = match &self.config {
            Some(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|source| SettingsError::ConfigIo {
                        path: path.clone(),
                        source,
                    })?;
                serde_json::from_str(&text).map_err(|source| SettingsError::ConfigParse {
                    path: path.clone(),
                    source,
                })?
            }
            None => Config::default(),
        };
        if let Some(tolerance) = self.intersection_tolerance_km {
            config.intersection_tolerance_km = tolerance;
        }
        if let Some(secs) = self.time_limit_secs.or_else(|| get_env(TIME_LIMIT_ENV)) {
            config.solver_time_limit = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn query(&self) -> RouteQuery {
        RouteQuery::new(self.min_km, self.max_km).with_unique_starts(self.unique_starts)
    }
}
