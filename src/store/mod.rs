use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{self, GeoPoint};
use crate::models::ride::{PaymentStatus, Ride, RideStatus, VehicleClass};
use crate::pricing;

/// Sole owner of ride records. Every mutation goes through `update_if`, which
/// holds the entry's shard write lock across the status check and the write,
/// so two racing callers serialize on the same ride.
pub struct RideStore {
    rides: DashMap<Uuid, Ride>,
}

impl RideStore {
    pub fn new() -> Self {
        Self {
            rides: DashMap::new(),
        }
    }

    pub fn create(
        &self,
        rider_id: Uuid,
        pickup: GeoPoint,
        dropoff: GeoPoint,
        vehicle: VehicleClass,
        pickup_address: Option<String>,
        dropoff_address: Option<String>,
    ) -> Ride {
        let distance = geo::distance_meters(&pickup, &dropoff);
        let now = Utc::now();

        let ride = Ride {
            id: Uuid::new_v4(),
            rider_id,
            driver_id: None,
            pickup,
            dropoff,
            pickup_address,
            dropoff_address,
            vehicle,
            fare: pricing::estimate_fare(vehicle, distance),
            distance_meters: distance,
            duration_minutes: pricing::estimate_duration_minutes(distance),
            status: RideStatus::Requested,
            payment_method: "cash".to_string(),
            payment_status: PaymentStatus::Pending,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        self.rides.insert(ride.id, ride.clone());
        ride
    }

    /// At most one driver wins this, no matter how many call it concurrently:
    /// the requested-check and the driver assignment are a single conditional
    /// write under the entry lock. Losers see `RideUnavailable`.
    pub fn accept(&self, ride_id: Uuid, driver_id: Uuid) -> Result<Ride, AppError> {
        self.update_if(
            ride_id,
            |ride| {
                if ride.status == RideStatus::Requested {
                    Ok(())
                } else {
                    Err(AppError::RideUnavailable(ride_id))
                }
            },
            |ride| {
                ride.status = RideStatus::Accepted;
                ride.driver_id = Some(driver_id);
            },
        )
    }

    /// Driver-driven forward transitions: accepted → arrived → in_progress →
    /// completed. The actor must be a party of the ride; a ride the actor is
    /// not on reads as not found, matching how the source's conditional
    /// `WHERE rider_id OR driver_id` query behaved.
    pub fn transition(
        &self,
        ride_id: Uuid,
        actor_id: Uuid,
        new_status: RideStatus,
    ) -> Result<Ride, AppError> {
        self.update_if(
            ride_id,
            |ride| {
                if !ride.involves(actor_id) {
                    return Err(AppError::NotFound(format!("ride {ride_id} not found")));
                }
                if !ride.status.can_advance_to(new_status) {
                    return Err(AppError::InvalidTransition {
                        from: ride.status,
                        to: new_status,
                    });
                }
                Ok(())
            },
            |ride| {
                ride.status = new_status;
                if new_status == RideStatus::Completed {
                    ride.completed_at = Some(Utc::now());
                }
            },
        )
    }

    /// Legal only before the trip starts, i.e. from `requested` or `accepted`.
    pub fn cancel(
        &self,
        ride_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<Ride, AppError> {
        self.update_if(
            ride_id,
            |ride| {
                if !ride.involves(actor_id) {
                    return Err(AppError::NotFound(format!("ride {ride_id} not found")));
                }
                if !matches!(ride.status, RideStatus::Requested | RideStatus::Accepted) {
                    return Err(AppError::InvalidTransition {
                        from: ride.status,
                        to: RideStatus::Cancelled,
                    });
                }
                Ok(())
            },
            |ride| {
                ride.status = RideStatus::Cancelled;
                ride.cancellation_reason = reason;
            },
        )
    }

    pub fn get(&self, ride_id: Uuid) -> Option<Ride> {
        self.rides.get(&ride_id).map(|entry| entry.value().clone())
    }

    /// Rides the user is currently a party of with an assigned driver and no
    /// terminal state yet. Used to scope location fan-out to ride rooms.
    pub fn active_for(&self, user_id: Uuid) -> Vec<Ride> {
        self.rides
            .iter()
            .filter(|entry| entry.value().involves(user_id) && entry.value().status.is_active())
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }

    /// The one conditional-write primitive. `check` and `apply` both run while
    /// the entry's shard lock is held, the in-process equivalent of
    /// `UPDATE rides SET .. WHERE id = $1 AND status = $2`.
    fn update_if<C, M>(&self, ride_id: Uuid, check: C, apply: M) -> Result<Ride, AppError>
    where
        C: FnOnce(&Ride) -> Result<(), AppError>,
        M: FnOnce(&mut Ride),
    {
        let mut entry = self
            .rides
            .get_mut(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

        check(entry.value())?;
        apply(entry.value_mut());
        entry.updated_at = Utc::now();

        Ok(entry.value().clone())
    }
}

impl Default for RideStore {
    fn default() -> Self {
        Self::new()
    }
}
