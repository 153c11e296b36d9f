use serde::{Deserialize, Serialize};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Finite and inside the valid lat/lng ranges. Callers reject bad
    /// coordinates at the boundary; distance math assumes they did.
    pub fn in_bounds(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_METERS * central_angle
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, distance_meters};

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            latitude: 12.9716,
            longitude: 77.5946,
        };
        let distance = distance_meters(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn central_bangalore_to_koramangala_is_around_5_km() {
        let mg_road = GeoPoint {
            latitude: 12.9716,
            longitude: 77.5946,
        };
        let koramangala = GeoPoint {
            latitude: 12.9352,
            longitude: 77.6245,
        };
        let distance = distance_meters(&mg_road, &koramangala);
        assert!((distance - 5_200.0).abs() < 200.0);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            latitude: 51.5074,
            longitude: -0.1278,
        };
        let paris = GeoPoint {
            latitude: 48.8566,
            longitude: 2.3522,
        };
        let distance = distance_meters(&london, &paris);
        assert!((distance - 343_000.0).abs() < 5_000.0);
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let bad_lat = GeoPoint {
            latitude: 91.0,
            longitude: 0.0,
        };
        let bad_lng = GeoPoint {
            latitude: 0.0,
            longitude: -181.0,
        };
        let nan = GeoPoint {
            latitude: f64::NAN,
            longitude: 0.0,
        };
        assert!(!bad_lat.in_bounds());
        assert!(!bad_lng.in_bounds());
        assert!(!nan.in_bounds());
    }
}
