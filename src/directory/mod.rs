use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::geo::{self, GeoPoint};
use crate::models::driver::DriverPresence;

/// Proximity-queryable registry of online drivers. Offline entries are kept
/// but never surfaced; their location is stale by definition.
pub struct DriverDirectory {
    drivers: DashMap<Uuid, DriverPresence>,
    max_candidates: usize,
}

impl DriverDirectory {
    pub fn new(max_candidates: usize) -> Self {
        Self {
            drivers: DashMap::new(),
            max_candidates,
        }
    }

    pub fn set_online(&self, driver_id: Uuid, location: GeoPoint) {
        self.drivers.insert(
            driver_id,
            DriverPresence {
                driver_id,
                location,
                is_online: true,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn set_offline(&self, driver_id: Uuid) {
        if let Some(mut presence) = self.drivers.get_mut(&driver_id) {
            presence.is_online = false;
            presence.updated_at = Utc::now();
        }
    }

    /// No-op for offline or unknown drivers.
    pub fn update_location(&self, driver_id: Uuid, location: GeoPoint) {
        if let Some(mut presence) = self.drivers.get_mut(&driver_id) {
            if presence.is_online {
                presence.location = location;
                presence.updated_at = Utc::now();
            }
        }
    }

    pub fn is_online(&self, driver_id: Uuid) -> bool {
        self.drivers
            .get(&driver_id)
            .is_some_and(|presence| presence.is_online)
    }

    /// Online drivers within `radius_meters` of `origin`, closest first,
    /// capped to bound dispatch fan-out. An empty result is not an error.
    pub fn find_nearby(&self, origin: &GeoPoint, radius_meters: f64) -> Vec<(Uuid, f64)> {
        let mut hits: Vec<(Uuid, f64)> = self
            .drivers
            .iter()
            .filter(|entry| entry.value().is_online)
            .filter_map(|entry| {
                let distance = geo::distance_meters(origin, &entry.value().location);
                (distance <= radius_meters).then_some((entry.value().driver_id, distance))
            })
            .collect();

        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(self.max_candidates);
        hits
    }

    pub fn online_count(&self) -> usize {
        self.drivers
            .iter()
            .filter(|entry| entry.value().is_online)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::DriverDirectory;
    use crate::geo::GeoPoint;

    const ORIGIN: GeoPoint = GeoPoint {
        latitude: 12.9716,
        longitude: 77.5946,
    };

    /// A point roughly `meters` north of ORIGIN (1 degree of latitude is
    /// ~111,195 m on the haversine sphere).
    fn north_of_origin(meters: f64) -> GeoPoint {
        GeoPoint {
            latitude: ORIGIN.latitude + meters / 111_195.0,
            longitude: ORIGIN.longitude,
        }
    }

    #[test]
    fn nearby_drivers_come_back_closest_first_within_radius() {
        let directory = DriverDirectory::new(20);
        let at_200 = Uuid::new_v4();
        let at_50 = Uuid::new_v4();
        let at_5200 = Uuid::new_v4();

        directory.set_online(at_200, north_of_origin(200.0));
        directory.set_online(at_50, north_of_origin(50.0));
        directory.set_online(at_5200, north_of_origin(5_200.0));

        let hits = directory.find_nearby(&ORIGIN, 5_000.0);
        let ids: Vec<Uuid> = hits.iter().map(|(id, _)| *id).collect();

        assert_eq!(ids, vec![at_50, at_200]);
        assert!(hits[0].1 < hits[1].1);
    }

    #[test]
    fn offline_drivers_are_never_matched() {
        let directory = DriverDirectory::new(20);
        let driver = Uuid::new_v4();

        directory.set_online(driver, north_of_origin(100.0));
        assert_eq!(directory.find_nearby(&ORIGIN, 5_000.0).len(), 1);

        directory.set_offline(driver);
        assert!(directory.find_nearby(&ORIGIN, 5_000.0).is_empty());
        assert!(!directory.is_online(driver));
    }

    #[test]
    fn location_updates_for_offline_drivers_are_dropped() {
        let directory = DriverDirectory::new(20);
        let driver = Uuid::new_v4();

        directory.set_online(driver, north_of_origin(100.0));
        directory.set_offline(driver);
        directory.update_location(driver, north_of_origin(10.0));

        // coming back online at a new point replaces the stale location
        assert!(directory.find_nearby(&ORIGIN, 5_000.0).is_empty());
        directory.set_online(driver, north_of_origin(300.0));
        let hits = directory.find_nearby(&ORIGIN, 5_000.0);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].1 - 300.0).abs() < 5.0);
    }

    #[test]
    fn update_location_for_unknown_driver_is_a_noop() {
        let directory = DriverDirectory::new(20);
        directory.update_location(Uuid::new_v4(), ORIGIN);
        assert_eq!(directory.online_count(), 0);
    }

    #[test]
    fn candidate_list_is_capped() {
        let directory = DriverDirectory::new(3);
        for step in 1..=10 {
            directory.set_online(Uuid::new_v4(), north_of_origin(step as f64 * 100.0));
        }

        let hits = directory.find_nearby(&ORIGIN, 5_000.0);
        assert_eq!(hits.len(), 3);
        // the cap keeps the closest candidates, not an arbitrary subset
        assert!(hits.iter().all(|(_, distance)| *distance < 350.0));
    }
}
