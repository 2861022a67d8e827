pub const EARTH_RADIUS_KM: f64 = 6371.0;

fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

/// Great-circle distance in kilometers.
pub fn haversine_distance(
    latitude_1: f64,
    longitude_1: f64,
    latitude_2: f64,
    longitude_2: f64,
) -> f64 {
    let lat1_rad = to_radians(latitude_1);
    let lon1_rad = to_radians(longitude_1);
    let lat2_rad = to_radians(latitude_2);
    let lon2_rad = to_radians(longitude_2);

    let dlat = lat2_rad - lat1_rad;
    let dlon = lon2_rad - lon1_rad;

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Linear interpolation in latitude/longitude space. `fraction` is clamped
/// to `[0, 1]`.
pub fn interpolate(
    latitude_1: f64,
    longitude_1: f64,
    latitude_2: f64,
    longitude_2: f64,
    fraction: f64,
) -> (f64, f64) {
    let fraction = fraction.clamp(0.0, 1.0);
    (
        latitude_1 + (latitude_2 - latitude_1) * fraction,
        longitude_1 + (longitude_2 - longitude_1) * fraction,
    )
}

/// Travel time in whole minutes at a constant speed.
pub fn eta_minutes(distance_km: f64, speed_km_per_hour: f64) -> u32 {
    if speed_km_per_hour <= 0.0 || !distance_km.is_finite() {
        return 0;
    }
    (distance_km / speed_km_per_hour * 60.0).round().max(0.0) as u32
}
