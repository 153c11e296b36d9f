use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{self, GeoPoint};
use crate::models::ride::{Ride, VehicleClass};
use crate::pricing;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides/estimate", post(estimate))
        .route("/rides/:id", get(get_ride))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub vehicle_type: VehicleClass,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub distance: f64,
    pub fare: i64,
    pub estimated_minutes: i64,
    pub vehicle_type: VehicleClass,
}

async fn estimate(
    Json(payload): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>, AppError> {
    if !payload.pickup.in_bounds() || !payload.dropoff.in_bounds() {
        return Err(AppError::Validation(
            "pickup and dropoff must be valid coordinates".to_string(),
        ));
    }

    let distance = geo::distance_meters(&payload.pickup, &payload.dropoff);

    Ok(Json(EstimateResponse {
        distance: distance.round(),
        fare: pricing::estimate_fare(payload.vehicle_type, distance),
        estimated_minutes: pricing::estimate_duration_minutes(distance),
        vehicle_type: payload.vehicle_type,
    }))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    state
        .rides
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("ride {id} not found")))
}
