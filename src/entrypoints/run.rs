use super::profiling::setup_logging_and_profiling;
use crate::settings::{Settings, SettingsError};
use geo::Coord;
use std::process::ExitCode;
use trail_planner_lib::{
    CoordinateGeocoder, GeocodeError, Geocoder, GpxDirectory, PlannerError, RouteSolution,
    TrailNetwork, export,
};

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Planner(#[from] PlannerError),
}

impl AppError {
    fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Settings(_) | AppError::Geocode(_) => ExitCode::from(2),
            AppError::Planner(e) if e.is_infeasible() => ExitCode::from(3),
            AppError::Planner(_) => ExitCode::FAILURE,
        }
    }
}

fn log_version_info() {
    tracing::info!(
        "{} v{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );
}

/// Load, build, optimize and export according to `settings`
#[cfg_attr(feature = "profiling", profiling::function)]
fn plan(settings: &Settings) -> Result<RouteSolution, AppError> {
    settings.validate()?;
    let config = settings.config()?;

    let source = GpxDirectory::new(&settings.tracks_dir);
    let mut network = TrailNetwork::load(&source, config)?;

    if let (Some(location), Some(radius_km)) = (&settings.location, settings.radius_km) {
        let (lat, lon) = CoordinateGeocoder.resolve_location(location)?;
        let removed = network.retain_within(Coord { x: lon, y: lat }, radius_km);
        tracing::info!(
            "Kept {} tracks within {} km of ({}, {}), dropped {}",
            network.tracks().len(),
            radius_km,
            lat,
            lon,
            removed
        );
    }

    network.build();
    let mut optimizer = network.optimizer();
    let solution = optimizer.solve(settings.query())?.clone().into_result()?;
    tracing::info!(
        "Route: {} paths, {:.2} km (window {}-{} km)",
        solution.selected_edges().len(),
        solution.total_distance(),
        settings.min_km,
        settings.max_km
    );

    let name = settings
        .output
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("route");
    export::save_gpx(&solution, name, &settings.output)?;
    Ok(solution)
}

/// Native entry point
pub fn native_main() -> ExitCode {
    let _guard = setup_logging_and_profiling();
    log_version_info();

    let settings = Settings::from_cli();
    match plan(&settings) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            e.exit_code()
        }
    }
}
