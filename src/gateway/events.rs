use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::ride::{RideStatus, VehicleClass};

/// Inbound wire contract. Envelope is `{"event": "...", "data": {...}}` with
/// snake_case event names and camelCase payload fields, matching the mobile
/// client protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    RequestRide {
        pickup: GeoPoint,
        dropoff: GeoPoint,
        vehicle_type: VehicleClass,
        #[serde(default)]
        pickup_address: Option<String>,
        #[serde(default)]
        dropoff_address: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AcceptRide { ride_id: Uuid },
    UpdateLocation { location: GeoPoint },
    #[serde(rename_all = "camelCase")]
    UpdateRideStatus { ride_id: Uuid, status: RideStatus },
    #[serde(rename_all = "camelCase")]
    CancelRide {
        ride_id: Uuid,
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SendMessage { ride_id: Uuid, message: String },
    #[serde(rename_all = "camelCase")]
    DriverStatusChange {
        is_online: bool,
        #[serde(default)]
        location: Option<GeoPoint>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    RideCreated { ride_id: Uuid },
    /// The offer delivered to each candidate driver's personal room.
    #[serde(rename_all = "camelCase")]
    RideRequest {
        ride_id: Uuid,
        pickup: GeoPoint,
        dropoff: GeoPoint,
        vehicle_type: VehicleClass,
        fare: i64,
        distance: f64,
        rider_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    DriverAssigned {
        driver_id: Uuid,
        ride_id: Uuid,
        status: RideStatus,
    },
    /// Sent to candidates whose offer is void because someone else won.
    #[serde(rename_all = "camelCase")]
    RideTaken { ride_id: Uuid },
    #[serde(rename_all = "camelCase")]
    LocationUpdate {
        user_id: Uuid,
        location: GeoPoint,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    RideStatusChange {
        ride_id: Uuid,
        status: RideStatus,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    MessageReceived {
        ride_id: Uuid,
        message: String,
        sender_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    DriverStatusUpdate {
        driver_id: Uuid,
        is_online: bool,
        location: Option<GeoPoint>,
    },
    Error { message: String },
}
