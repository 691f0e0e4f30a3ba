//! Track sources and location resolution
//!
//! The planner reads raw recordings through [`TrackSource`] and resolves a
//! place description through [`Geocoder`]. Both are traits so callers can
//! plug in other backends; this module ships a GPX directory reader and a
//! literal-coordinate geocoder.

use crate::utils::{self, MAX_LATITUDE, MAX_LONGITUDE};
use crate::{Config, GeocodeError, Track, TrackLoadError};
use geo::{Coord, LineString};
use std::path::{Path, PathBuf};

/// A raw recording before normalization
#[derive(Clone, Debug, PartialEq)]
pub struct RawTrack {
    /// Where the recording came from (file stem for [`GpxDirectory`])
    pub identifier: String,
    /// Human-readable trail name, unique within a planning run
    pub name: String,
    /// Recorded points as (longitude, latitude)
    pub geometry: LineString<f64>,
}

impl RawTrack {
    /// Extract the first track of a parsed GPX document.
    ///
    /// All segments of that track are concatenated in order; points outside
    /// WGS84 bounds are dropped.
    pub fn from_gpx(identifier: &str, gpx: gpx::Gpx) -> Result<Self, TrackLoadError> {
        let track = gpx
            .tracks
            .into_iter()
            .next()
            .ok_or_else(|| TrackLoadError::NoTrack(identifier.to_string()))?;

        let coords: Vec<Coord<f64>> = track
            .segments
            .iter()
            .flat_map(|segment| segment.points.iter())
            .map(utils::waypoint_to_coord)
            .filter(utils::is_valid_wgs84)
            .collect();
        if coords.len() < 2 {
            return Err(TrackLoadError::TooFewPoints {
                identifier: identifier.to_string(),
                points: coords.len(),
            });
        }

        let name = match track.name.map(|name| name.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => {
                tracing::info!("Track {} has no name, using its identifier", identifier);
                identifier.to_string()
            }
        };

        Ok(Self {
            identifier: identifier.to_string(),
            name,
            geometry: LineString::new(coords),
        })
    }
}

/// Where raw track recordings come from
pub trait TrackSource: Send + Sync {
    /// Identifiers of every available recording, in a stable order
    fn identifiers(&self) -> Result<Vec<String>, TrackLoadError>;

    /// Load one recording by identifier
    fn load_track(&self, identifier: &str) -> Result<RawTrack, TrackLoadError>;
}

/// A directory of `*.gpx` files, one recording per file
#[derive(Clone, Debug)]
pub struct GpxDirectory {
    root: PathBuf,
}

impl GpxDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, identifier: &str) -> PathBuf {
        self.root.join(format!("{identifier}.gpx"))
    }
}

impl TrackSource for GpxDirectory {
    fn identifiers(&self) -> Result<Vec<String>, TrackLoadError> {
        let io_error = |source| TrackLoadError::Io {
            identifier: self.root.display().to_string(),
            source,
        };

        let mut identifiers = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            let is_gpx = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("gpx"));
            if !is_gpx || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                identifiers.push(stem.to_string());
            }
        }
        identifiers.sort();

        tracing::debug!(
            "Found {} GPX files in {}",
            identifiers.len(),
            self.root.display()
        );
        Ok(identifiers)
    }

    fn load_track(&self, identifier: &str) -> Result<RawTrack, TrackLoadError> {
        #[cfg(feature = "profiling")]
        profiling::scope!("source::load_track");

        let file = std::fs::File::open(self.file_for(identifier)).map_err(|source| {
            TrackLoadError::Io {
                identifier: identifier.to_string(),
                source,
            }
        })?;
        let reader = std::io::BufReader::new(file);
        let gpx = gpx::read(reader).map_err(|source| TrackLoadError::GpxParse {
            identifier: identifier.to_string(),
            source,
        })?;
        RawTrack::from_gpx(identifier, gpx)
    }
}

/// Resolves a place description to `(latitude, longitude)`
pub trait Geocoder {
    fn resolve_location(&self, place: &str) -> Result<(f64, f64), GeocodeError>;
}

/// Geocoder accepting literal `"lat,lon"` coordinates
#[derive(Clone, Copy, Debug, Default)]
pub struct CoordinateGeocoder;

impl Geocoder for CoordinateGeocoder {
    fn resolve_location(&self, place: &str) -> Result<(f64, f64), GeocodeError> {
        let unresolvable = || GeocodeError::Unresolvable(place.to_string());

        let (lat, lon) = place.trim().split_once(',').ok_or_else(unresolvable)?;
        let lat: f64 = lat.trim().parse().map_err(|_| unresolvable())?;
        let lon: f64 = lon.trim().parse().map_err(|_| unresolvable())?;

        if !lat.is_finite() || !lon.is_finite() || lat.abs() > MAX_LATITUDE || lon.abs() > MAX_LONGITUDE {
            return Err(GeocodeError::OutOfRange { lat, lon });
        }
        Ok((lat, lon))
    }
}

/// Whether any vertex of `track` lies within `radius_km` of `center`
///
/// `center` is (longitude, latitude), like every stored coordinate.
pub fn within_radius(track: &Track, center: Coord<f64>, radius_km: f64, config: &Config) -> bool {
    track
        .geometry()
        .coords()
        .any(|c| utils::scaled_distance_km(*c, center, config.km_per_degree) <= radius_km)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Mesa Trail</name>
    <trkseg>
      <trkpt lat="39.98" lon="-105.28"></trkpt>
      <trkpt lat="39.99" lon="-105.28"></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="40.00" lon="-105.27"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "trail-planner-source-{}-{}",
            label,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_from_gpx_concatenates_segments() {
        let gpx = gpx::read(SAMPLE.as_bytes()).unwrap();
        let raw = RawTrack::from_gpx("mesa", gpx).unwrap();
        assert_eq!(raw.name, "Mesa Trail");
        assert_eq!(raw.identifier, "mesa");
        assert_eq!(raw.geometry.0.len(), 3);
        assert_eq!(raw.geometry.0[0], Coord { x: -105.28, y: 39.98 });
    }

    #[test]
    fn test_from_gpx_without_tracks() {
        let gpx = gpx::read(
            r#"<?xml version="1.0"?><gpx version="1.1" creator="test"></gpx>"#.as_bytes(),
        )
        .unwrap();
        assert!(matches!(
            RawTrack::from_gpx("empty", gpx),
            Err(TrackLoadError::NoTrack(_))
        ));
    }

    #[test]
    fn test_gpx_directory_lists_sorted_stems() {
        let dir = temp_dir("list");
        std::fs::write(dir.join("b.gpx"), SAMPLE).unwrap();
        std::fs::write(dir.join("a.gpx"), SAMPLE).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a track").unwrap();

        let source = GpxDirectory::new(&dir);
        assert_eq!(source.identifiers().unwrap(), vec!["a", "b"]);
        assert_eq!(source.load_track("a").unwrap().name, "Mesa Trail");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_gpx_directory_reports_bad_files() {
        let dir = temp_dir("bad");
        std::fs::write(dir.join("broken.gpx"), "<gpx><trk>").unwrap();

        let source = GpxDirectory::new(&dir);
        assert!(matches!(
            source.load_track("broken"),
            Err(TrackLoadError::GpxParse { .. })
        ));
        assert!(matches!(
            source.load_track("missing"),
            Err(TrackLoadError::Io { .. })
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let source = GpxDirectory::new("/definitely/not/a/trail/dir");
        assert!(source.identifiers().is_err());
    }

    #[test]
    fn test_coordinate_geocoder() {
        let geocoder = CoordinateGeocoder;
        assert_eq!(
            geocoder.resolve_location(" 39.98, -105.28 ").unwrap(),
            (39.98, -105.28)
        );
        assert!(matches!(
            geocoder.resolve_location("Boulder, CO"),
            Err(GeocodeError::Unresolvable(_))
        ));
        assert!(matches!(
            geocoder.resolve_location(""),
            Err(GeocodeError::Unresolvable(_))
        ));
        assert!(matches!(
            geocoder.resolve_location("95.0,10.0"),
            Err(GeocodeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_within_radius() {
        let config = Config::default();
        let track = Track::from_geometry(
            "Near",
            line_string![(x: 0.0, y: 0.0), (x: 0.1, y: 0.0)],
            &config,
        )
        .unwrap();
        // 0.1 deg is 11.1 km
        assert!(within_radius(&track, Coord { x: 0.1, y: 0.05 }, 6.0, &config));
        assert!(!within_radius(&track, Coord { x: 1.0, y: 1.0 }, 50.0, &config));
    }
}
