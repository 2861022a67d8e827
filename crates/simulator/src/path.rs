//! Movement of a point along a polyline.

use model::location::Location;

/// Slack for deciding whether a point lies on a segment. Linear lat/lng
/// interpolation deviates slightly from the great circle.
pub const ON_SEGMENT_TOLERANCE_KM: f64 = 0.001;

/// Result of walking along a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub position: Location,
    /// Index of the last vertex reached or passed.
    pub index: usize,
    /// Distance actually covered.
    pub travelled_km: f64,
}

/// Walks from `position` (on the segment starting at `index`) along `path`
/// for at most `budget_km`, never passing the vertex at `limit`.
///
/// Every loop iteration either consumes a whole segment (the index grows) or
/// spends the remaining budget, so the walk always terminates.
pub fn advance(
    path: &[Location],
    position: Location,
    index: usize,
    budget_km: f64,
    limit: usize,
) -> Step {
    let limit = limit.min(path.len().saturating_sub(1));
    let mut position = position;
    let mut index = index;
    let mut remaining = budget_km.max(0.0);
    let mut travelled = 0.0;

    while remaining > 0.0 && index < limit {
        let next = path[index + 1];
        let to_next = position.distance_to(&next);
        if to_next <= remaining {
            remaining -= to_next;
            travelled += to_next;
            position = next;
            index += 1;
        } else {
            position = position.interpolate(&next, remaining / to_next);
            travelled += remaining;
            remaining = 0.0;
        }
    }

    Step {
        position,
        index,
        travelled_km: travelled,
    }
}

/// Index and distance of the vertex closest to `point`.
pub fn nearest_vertex(path: &[Location], point: &Location) -> Option<(usize, f64)> {
    path.iter()
        .map(|vertex| vertex.distance_to(point))
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Index of the vertex matching `point` within `tolerance_km`. Of several
/// candidates the closest wins. Errors with the distance of the nearest
/// vertex.
pub fn match_vertex(
    path: &[Location],
    point: &Location,
    tolerance_km: f64,
) -> Result<usize, f64> {
    match nearest_vertex(path, point) {
        Some((index, distance)) if distance <= tolerance_km => Ok(index),
        Some((_, distance)) => Err(distance),
        None => Err(f64::INFINITY),
    }
}

/// True if `point` lies on the segment `[path[index], path[index + 1]]`, or
/// equals the final vertex when `index` is the last one.
pub fn is_on_segment(path: &[Location], index: usize, point: &Location) -> bool {
    let Some(start) = path.get(index) else {
        return false;
    };
    match path.get(index + 1) {
        Some(end) => {
            let detour = start.distance_to(point) + point.distance_to(end)
                - start.distance_to(end);
            detour <= ON_SEGMENT_TOLERANCE_KM
        }
        None => start.distance_to(point) <= ON_SEGMENT_TOLERANCE_KM,
    }
}
