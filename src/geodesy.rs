// Spherical earth distance, bearing and destination
//
// All angles are in degrees on the way in and out. The earth is treated as a
// sphere of radius EARTH_RADIUS_M.

use crate::constants::EARTH_RADIUS_M;

/// Great-circle distance in meters and initial bearing in degrees `[0, 360)`
/// from the first point to the second.
pub fn distance_and_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    // haversine
    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    let distance = EARTH_RADIUS_M * c;

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);

    (distance, bearing)
}

/// Point reached by travelling `distance_m` meters from the start on the
/// given initial bearing. Longitude is normalised to `[-180, 180]`.
pub fn destination(lat: f64, lon: f64, distance_m: f64, bearing_deg: f64) -> (f64, f64) {
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_m / EARTH_RADIUS_M;

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    (phi2.to_degrees(), normalize_longitude(lambda2.to_degrees()))
}

fn normalize_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 540.0).rem_euclid(360.0) - 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let (distance, _) = distance_and_bearing(37.0, -122.0, 37.0, -122.0);
        assert!(distance.abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let (distance, bearing) = distance_and_bearing(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_M * 1.0_f64.to_radians();
        assert!((distance - expected).abs() < 1e-6);
        assert!(bearing.abs() < 1e-9);
    }

    #[test]
    fn test_bearing_is_in_range() {
        // due west
        let (_, bearing) = distance_and_bearing(0.0, 0.0, 0.0, -1.0);
        assert!((bearing - 270.0).abs() < 1e-9);
        // due south
        let (_, bearing) = distance_and_bearing(1.0, 0.0, 0.0, 0.0);
        assert!((bearing - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_destination_round_trip() {
        let pairs = [
            ((37.7749, -122.4194), (34.0522, -118.2437)),
            ((-33.8688, 151.2093), (-37.8136, 144.9631)),
            ((51.5074, -0.1278), (48.8566, 2.3522)),
            ((10.0, 179.5), (10.5, -179.5)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let (distance, bearing) = distance_and_bearing(lat1, lon1, lat2, lon2);
            let (lat, lon) = destination(lat1, lon1, distance, bearing);
            assert!((lat - lat2).abs() < 1e-6, "lat {} vs {}", lat, lat2);
            assert!((lon - lon2).abs() < 1e-6, "lon {} vs {}", lon, lon2);
        }
    }

    #[test]
    fn test_destination_normalises_longitude() {
        let (_, lon) = destination(0.0, 179.9, 50_000.0, 90.0);
        assert!((-180.0..=180.0).contains(&lon));
        assert!(lon < 0.0);
    }
}
