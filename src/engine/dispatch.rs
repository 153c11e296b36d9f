use tracing::info;
use uuid::Uuid;

use crate::gateway::events::ServerEvent;
use crate::models::ride::Ride;
use crate::state::AppState;

/// Offers a freshly requested ride to every online driver within the dispatch
/// radius and records who was notified. Returns the notified set. With no
/// candidates the ride simply stays `requested`; there is no timeout or
/// re-dispatch (see DESIGN.md).
pub fn dispatch_ride(state: &AppState, ride: &Ride) -> Vec<Uuid> {
    let candidates = state
        .drivers
        .find_nearby(&ride.pickup, state.dispatch_radius_meters);
    state
        .metrics
        .dispatch_candidates
        .observe(candidates.len() as f64);

    if candidates.is_empty() {
        info!(ride_id = %ride.id, "no drivers in range, ride stays requested");
        return Vec::new();
    }

    let offer = ServerEvent::RideRequest {
        ride_id: ride.id,
        pickup: ride.pickup,
        dropoff: ride.dropoff,
        vehicle_type: ride.vehicle,
        fare: ride.fare,
        distance: ride.distance_meters,
        rider_id: ride.rider_id,
    };

    let notified: Vec<Uuid> = candidates.into_iter().map(|(driver_id, _)| driver_id).collect();
    for driver_id in &notified {
        state.sessions.send_to_user(*driver_id, &offer);
    }

    state.offers.insert(ride.id, notified.clone());
    info!(
        ride_id = %ride.id,
        notified = notified.len(),
        "ride offered to nearby drivers"
    );
    notified
}

/// After a driver wins the acceptance race, voids the offer for every other
/// candidate it went to. Targeted delivery only; nobody outside the notified
/// set hears about it.
pub fn resolve_offers(state: &AppState, ride_id: Uuid, winner: Uuid) {
    if let Some((_, notified)) = state.offers.remove(&ride_id) {
        let event = ServerEvent::RideTaken { ride_id };
        for driver_id in notified {
            if driver_id != winner {
                state.sessions.send_to_user(driver_id, &event);
            }
        }
    }
}

/// Voids an unresolved offer outright, e.g. when the rider cancels while the
/// ride is still `requested`.
pub fn withdraw_offers(state: &AppState, ride_id: Uuid) {
    if let Some((_, notified)) = state.offers.remove(&ride_id) {
        let event = ServerEvent::RideTaken { ride_id };
        for driver_id in notified {
            state.sessions.send_to_user(driver_id, &event);
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::{dispatch_ride, resolve_offers};
    use crate::config::Config;
    use crate::gateway::events::ServerEvent;
    use crate::geo::GeoPoint;
    use crate::models::ride::VehicleClass;
    use crate::state::AppState;

    fn test_state() -> AppState {
        AppState::new(&Config {
            http_port: 0,
            log_level: "warn".to_string(),
            dispatch_radius_meters: 5_000.0,
            max_dispatch_candidates: 20,
            session_buffer_size: 16,
        })
    }

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    fn online_driver_with_session(
        state: &AppState,
        location: GeoPoint,
    ) -> (Uuid, mpsc::Receiver<ServerEvent>) {
        let driver_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(16);
        state.sessions.register(Uuid::new_v4(), driver_id, tx);
        state.drivers.set_online(driver_id, location);
        (driver_id, rx)
    }

    #[test]
    fn dispatch_notifies_candidates_in_range_and_records_the_offer() {
        let state = test_state();
        let pickup = point(12.9716, 77.5946);
        let (near, mut near_rx) = online_driver_with_session(&state, point(12.9720, 77.5950));
        let (_far, mut far_rx) = online_driver_with_session(&state, point(13.20, 77.90));

        let ride = state.rides.create(
            Uuid::new_v4(),
            pickup,
            point(12.9352, 77.6245),
            VehicleClass::Sedan,
            None,
            None,
        );

        let notified = dispatch_ride(&state, &ride);
        assert_eq!(notified, vec![near]);

        match near_rx.try_recv().unwrap() {
            ServerEvent::RideRequest { ride_id, fare, .. } => {
                assert_eq!(ride_id, ride.id);
                assert_eq!(fare, ride.fare);
            }
            other => panic!("expected ride_request, got {other:?}"),
        }
        assert!(far_rx.try_recv().is_err());
        assert!(state.offers.contains_key(&ride.id));
    }

    #[test]
    fn no_candidates_means_no_offer_record() {
        let state = test_state();
        let ride = state.rides.create(
            Uuid::new_v4(),
            point(12.9716, 77.5946),
            point(12.9352, 77.6245),
            VehicleClass::Sedan,
            None,
            None,
        );

        let notified = dispatch_ride(&state, &ride);
        assert!(notified.is_empty());
        assert!(!state.offers.contains_key(&ride.id));
    }

    #[test]
    fn resolving_an_offer_voids_it_for_the_losers_only() {
        let state = test_state();
        let pickup = point(12.9716, 77.5946);
        let (winner, mut winner_rx) = online_driver_with_session(&state, point(12.9717, 77.5947));
        let (loser, mut loser_rx) = online_driver_with_session(&state, point(12.9720, 77.5950));

        let ride = state.rides.create(
            Uuid::new_v4(),
            pickup,
            point(12.9352, 77.6245),
            VehicleClass::Auto,
            None,
            None,
        );

        let notified = dispatch_ride(&state, &ride);
        assert_eq!(notified.len(), 2);
        // both drained their offer
        assert!(winner_rx.try_recv().is_ok());
        assert!(loser_rx.try_recv().is_ok());

        resolve_offers(&state, ride.id, winner);
        assert!(matches!(
            loser_rx.try_recv().unwrap(),
            ServerEvent::RideTaken { ride_id } if ride_id == ride.id
        ));
        assert!(winner_rx.try_recv().is_err());
        assert!(!state.offers.contains_key(&ride.id));

        // losers list is gone; resolving again is a no-op
        resolve_offers(&state, ride.id, loser);
        assert!(loser_rx.try_recv().is_err());
    }
}
