//! Great-circle geometry helpers. Pure functions, no state.

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle (haversine) distance between two coordinates, in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial compass bearing from (lat1, lon1) towards (lat2, lon2),
/// in degrees normalized to [0, 360).
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();
    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Index of the polyline point nearest to (lat, lon) by great-circle
/// distance. Linear scan; polylines here are at most a few hundred
/// points. Returns `None` for an empty polyline.
pub fn nearest_point_index<I>(points: I, lat: f64, lon: f64) -> Option<usize>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, (p_lat, p_lon)) in points.into_iter().enumerate() {
        let dist = haversine_distance(lat, lon, p_lat, p_lon);
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((idx, dist));
        }
    }
    best.map(|(idx, _)| idx)
}
