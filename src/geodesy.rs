//! Great-circle helpers shared by every component.

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude, also used as the flat-earth conversion
/// factor for small distances.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Haversine great-circle distance in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from (lat1, lon1) towards (lat2, lon2), degrees in [0, 360).
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let y = d_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * d_lon.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Wrap a bearing into [0, 360).
pub fn normalize_bearing(bearing: f64) -> f64 {
    let b = bearing % 360.0;
    if b < 0.0 {
        b + 360.0
    } else {
        b
    }
}

/// Absolute difference between two bearings, folded into [0, 180].
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    let d = (normalize_bearing(a) - normalize_bearing(b)).abs();
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Signed change of direction from bearing `a` to bearing `b`, in (-180, 180].
/// Positive values turn right, negative turn left.
pub fn signed_bearing_change(a: f64, b: f64) -> f64 {
    let mut d = normalize_bearing(b) - normalize_bearing(a);
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Orthogonal projection of a point onto the segment `a -> b`, computed in
/// plain lat/lon plane coordinates.
///
/// Returns the projection parameter clamped to [0, 1] and the projected
/// coordinate. A degenerate segment projects onto `a` at t = 0.
pub fn project_onto_segment(
    point: (f64, f64),
    a: (f64, f64),
    b: (f64, f64),
) -> (f64, (f64, f64)) {
    let d_lat = b.0 - a.0;
    let d_lon = b.1 - a.1;
    let length_sq = d_lat * d_lat + d_lon * d_lon;
    if length_sq < 1e-18 {
        return (0.0, a);
    }

    let t = (((point.0 - a.0) * d_lat + (point.1 - a.1) * d_lon) / length_sq).clamp(0.0, 1.0);
    (t, (a.0 + t * d_lat, a.1 + t * d_lon))
}
