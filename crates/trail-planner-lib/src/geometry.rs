//! Planar polyline operations in degree space
//!
//! These are the tolerance-aware primitives the graph builder is made of:
//! locating a point on a line, interpolating along it, splitting it at a
//! snapped point, and finding the nearest point pair between two lines.
//!
//! Endpoint results are always the exact input coordinates (never recomputed
//! through interpolation), because node identity downstream is bit-exact.

use crate::GeometryError;
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{
    Closest, ClosestPoint, Coord, Distance, Euclidean, Length, Line, LineInterpolatePoint,
    LineLocatePoint, LineString, Point,
};

/// Closest location on a line to a query point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineLocation {
    /// Index of the segment holding the closest point
    pub segment: usize,
    /// The closest point on the line
    pub coord: Coord<f64>,
    /// Distance along the line from its start to `coord`
    pub position: f64,
    /// Distance from the query point to `coord`
    pub distance: f64,
}

/// Nearest point pair between two lines
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoints {
    /// Point on the first line
    pub on_a: Coord<f64>,
    /// Point on the second line
    pub on_b: Coord<f64>,
    /// Distance between the two points
    pub distance: f64,
}

#[inline]
fn point_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Euclidean.distance(&Point::from(a), &Point::from(b))
}

/// Total length of a line
#[inline]
pub fn line_length(line: &LineString<f64>) -> f64 {
    Euclidean.length(line)
}

fn closest_coord(closest: Closest<f64>) -> Option<Coord<f64>> {
    match closest {
        Closest::Intersection(point) | Closest::SinglePoint(point) => Some(point.0),
        Closest::Indeterminate => None,
    }
}

/// Find the closest location on `line` to `point`
///
/// Returns `None` for an empty line. Ties keep the earliest segment.
pub fn locate(line: &LineString<f64>, point: Coord<f64>) -> Option<LineLocation> {
    let first = *line.0.first()?;
    let query = Point::from(point);
    let coord = closest_coord(line.closest_point(&query)).unwrap_or(first);
    let segment = line
        .lines()
        .enumerate()
        .map(|(index, segment)| (index, Euclidean.distance(&segment, &Point::from(coord))))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(index, _)| index);
    let fraction = line.line_locate_point(&query).unwrap_or(0.0);

    Some(LineLocation {
        segment,
        coord,
        position: fraction * line_length(line),
        distance: point_distance(coord, point),
    })
}

/// Distance along `line` of the point closest to `point`
#[inline]
pub fn project(line: &LineString<f64>, point: Coord<f64>) -> f64 {
    line.line_locate_point(&Point::from(point))
        .map_or(0.0, |fraction| fraction * line_length(line))
}

/// Point on `line` closest to `point`
#[inline]
pub fn closest_point(line: &LineString<f64>, point: Coord<f64>) -> Coord<f64> {
    closest_coord(line.closest_point(&Point::from(point)))
        .or_else(|| line.0.first().copied())
        .unwrap_or(point)
}

/// Point at distance `position` along `line`
///
/// Positions at or beyond the ends return the exact first/last coordinate.
/// Returns `None` for an empty line.
pub fn interpolate(line: &LineString<f64>, position: f64) -> Option<Coord<f64>> {
    let first = *line.0.first()?;
    let last = *line.0.last()?;
    let length = line_length(line);
    if position <= 0.0 || length == 0.0 {
        return Some(first);
    }
    if position >= length {
        return Some(last);
    }
    line.line_interpolate_point(position / length)
        .map(|point| point.0)
}

/// Snap `point` onto `line` within `tolerance` and split the line there.
///
/// A vertex within tolerance of the point is moved onto it; otherwise the
/// point is inserted into the closest segment. Both halves contain `point`
/// exactly as their shared end/start coordinate.
///
/// Splits that would leave an empty half fail with [`GeometryError::AtLineStart`]
/// or [`GeometryError::AtLineEnd`].
pub fn snap_split(
    line: &LineString<f64>,
    point: Coord<f64>,
    tolerance: f64,
) -> Result<(LineString<f64>, LineString<f64>), GeometryError> {
    let coords = &line.0;
    if coords.len() < 2 {
        return Err(GeometryError::Degenerate(format!(
            "cannot split a line with {} coordinate(s)",
            coords.len()
        )));
    }
    let last = coords.len() - 1;

    let (vertex, vertex_distance) = coords
        .iter()
        .enumerate()
        .map(|(i, c)| (i, point_distance(*c, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| GeometryError::Degenerate("empty line".to_string()))?;

    let (head_end, tail_start) = if vertex_distance <= tolerance {
        if vertex == 0 {
            return Err(GeometryError::AtLineStart {
                x: point.x,
                y: point.y,
            });
        }
        if vertex == last {
            return Err(GeometryError::AtLineEnd {
                x: point.x,
                y: point.y,
            });
        }
        (vertex, vertex + 1)
    } else {
        let location = locate(line, point).ok_or_else(|| {
            GeometryError::Degenerate("cannot locate point on empty line".to_string())
        })?;
        if location.distance > tolerance {
            return Err(GeometryError::SnapFailed {
                x: point.x,
                y: point.y,
                distance: location.distance,
                tolerance,
            });
        }
        (location.segment + 1, location.segment + 1)
    };

    let mut head: Vec<Coord<f64>> = coords[..head_end].to_vec();
    head.push(point);
    let mut tail: Vec<Coord<f64>> = Vec::with_capacity(coords.len() - tail_start + 1);
    tail.push(point);
    tail.extend_from_slice(&coords[tail_start..]);

    Ok((LineString::new(head), LineString::new(tail)))
}

/// Nearest point pair between two lines.
///
/// Away from crossings the minimum is reached at a vertex of one line, so
/// vertex candidates come first and shared vertices come back exactly. Only
/// lines that touch without a vertex candidate fall back to their proper
/// segment crossing. Returns `None` if either line has fewer than two
/// coordinates.
pub fn nearest_points(a: &LineString<f64>, b: &LineString<f64>) -> Option<NearestPoints> {
    if a.0.len() < 2 || b.0.len() < 2 {
        return None;
    }
    let gap = Euclidean.distance(a, b);

    let from_a = a
        .0
        .iter()
        .map(|&vertex| (vertex, closest_point(b, vertex)));
    let from_b = b
        .0
        .iter()
        .map(|&vertex| (closest_point(a, vertex), vertex));

    let mut best: Option<NearestPoints> = None;
    for (on_a, on_b) in from_a.chain(from_b) {
        let distance = point_distance(on_a, on_b);
        if best.is_none_or(|current| distance < current.distance) {
            best = Some(NearestPoints {
                on_a,
                on_b,
                distance,
            });
        }
        if distance == 0.0 {
            return best;
        }
    }

    if gap == 0.0 {
        if let Some(crossing) = first_crossing(a, b) {
            return Some(NearestPoints {
                on_a: crossing,
                on_b: crossing,
                distance: 0.0,
            });
        }
    }
    best
}

fn first_crossing(a: &LineString<f64>, b: &LineString<f64>) -> Option<Coord<f64>> {
    a.lines().find_map(|seg_a| {
        b.lines()
            .find_map(|seg_b| match line_intersection(seg_a, seg_b) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => Some(intersection),
                Some(LineIntersection::Collinear { intersection }) => Some(intersection.start),
                None => None,
            })
    })
}

/// Fraction of `first`'s segments lying on `second` within `tolerance`.
///
/// A segment counts as coincident when both of its end vertices are within
/// tolerance of `second`. Returns 0 for a line without segments.
pub fn coincidence_ratio(first: &LineString<f64>, second: &LineString<f64>, tolerance: f64) -> f64 {
    let segments = first.0.len().saturating_sub(1);
    if segments == 0 {
        return 0.0;
    }

    let on_second: Vec<bool> = first
        .0
        .iter()
        .map(|c| locate(second, *c).is_some_and(|loc| loc.distance <= tolerance))
        .collect();
    let coincident = on_second.windows(2).filter(|w| w[0] && w[1]).count();

    coincident as f64 / segments as f64
}

/// The same line traversed in the opposite direction
pub fn reversed(line: &LineString<f64>) -> LineString<f64> {
    LineString::new(line.0.iter().rev().copied().collect())
}

/// A two-point line, mostly useful for tests and fixtures
pub fn segment_line(a: Coord<f64>, b: Coord<f64>) -> LineString<f64> {
    LineString::from(Line::new(a, b))
}
