pub mod events;
pub mod sessions;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::dispatch;
use crate::error::AppError;
use crate::gateway::events::{ClientEvent, ServerEvent};
use crate::gateway::sessions::{Role, ride_room};
use crate::geo::GeoPoint;
use crate::models::ride::{RideStatus, VehicleClass};
use crate::state::AppState;

/// Identity of one live connection, established at handshake time and fixed
/// for the connection's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub conn_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

pub fn connect(state: &AppState, session: SessionContext, tx: mpsc::Sender<ServerEvent>) {
    state.sessions.register(session.conn_id, session.user_id, tx);
    state.metrics.connected_sessions.inc();
    info!(user_id = %session.user_id, role = %session.role, "session connected");
}

/// Runs unconditionally on connection teardown, normal or not, so a dropped
/// driver can never stay matchable.
pub fn disconnect(state: &AppState, session: SessionContext) {
    state.sessions.unregister(session.conn_id);
    if session.role == Role::Driver {
        state.drivers.set_offline(session.user_id);
        state
            .metrics
            .drivers_online
            .set(state.drivers.online_count() as i64);
    }
    state.metrics.connected_sessions.dec();
    info!(user_id = %session.user_id, role = %session.role, "session disconnected");
}

/// Routes one inbound event. Failures are surfaced as an `error` event to the
/// originating connection only; they never tear the connection down or leak
/// into anyone else's session.
pub fn handle_event(state: &AppState, session: SessionContext, event: ClientEvent) {
    if let Err(err) = route_event(state, session, event) {
        warn!(user_id = %session.user_id, error = %err, "event rejected");
        state.sessions.send_to_conn(
            session.conn_id,
            &ServerEvent::Error {
                message: err.to_string(),
            },
        );
    }
}

fn route_event(state: &AppState, session: SessionContext, event: ClientEvent) -> Result<(), AppError> {
    match event {
        ClientEvent::RequestRide {
            pickup,
            dropoff,
            vehicle_type,
            pickup_address,
            dropoff_address,
        } => request_ride(
            state,
            session,
            pickup,
            dropoff,
            vehicle_type,
            pickup_address,
            dropoff_address,
        ),
        ClientEvent::AcceptRide { ride_id } => accept_ride(state, session, ride_id),
        ClientEvent::UpdateLocation { location } => update_location(state, session, location),
        ClientEvent::UpdateRideStatus { ride_id, status } => {
            update_ride_status(state, session, ride_id, status)
        }
        ClientEvent::CancelRide { ride_id, reason } => cancel_ride(state, session, ride_id, reason),
        ClientEvent::SendMessage { ride_id, message } => {
            send_message(state, session, ride_id, message)
        }
        ClientEvent::DriverStatusChange {
            is_online,
            location,
        } => driver_status_change(state, session, is_online, location),
    }
}

fn require_role(session: SessionContext, role: Role, action: &str) -> Result<(), AppError> {
    if session.role == role {
        Ok(())
    } else {
        Err(AppError::Unauthorized(format!("only a {role} may {action}")))
    }
}

fn validate_point(point: &GeoPoint, field: &str) -> Result<(), AppError> {
    if point.in_bounds() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{field} is not a valid coordinate"
        )))
    }
}

fn request_ride(
    state: &AppState,
    session: SessionContext,
    pickup: GeoPoint,
    dropoff: GeoPoint,
    vehicle_type: VehicleClass,
    pickup_address: Option<String>,
    dropoff_address: Option<String>,
) -> Result<(), AppError> {
    require_role(session, Role::Rider, "request a ride")?;
    validate_point(&pickup, "pickup")?;
    validate_point(&dropoff, "dropoff")?;

    let ride = state.rides.create(
        session.user_id,
        pickup,
        dropoff,
        vehicle_type,
        pickup_address,
        dropoff_address,
    );
    state.metrics.rides_total.with_label_values(&["created"]).inc();

    // the rider follows their ride from request time onward
    state.sessions.join(session.conn_id, ride_room(ride.id));

    let notified = dispatch::dispatch_ride(state, &ride);
    state.sessions.send_to_conn(
        session.conn_id,
        &ServerEvent::RideCreated { ride_id: ride.id },
    );

    info!(
        ride_id = %ride.id,
        rider_id = %session.user_id,
        notified = notified.len(),
        "ride requested"
    );
    Ok(())
}

fn accept_ride(state: &AppState, session: SessionContext, ride_id: Uuid) -> Result<(), AppError> {
    require_role(session, Role::Driver, "accept a ride")?;

    let ride = match state.rides.accept(ride_id, session.user_id) {
        Ok(ride) => {
            state
                .metrics
                .accept_attempts_total
                .with_label_values(&["won"])
                .inc();
            ride
        }
        Err(err) => {
            if matches!(err, AppError::RideUnavailable(_)) {
                state
                    .metrics
                    .accept_attempts_total
                    .with_label_values(&["lost"])
                    .inc();
            }
            return Err(err);
        }
    };

    let room = ride_room(ride_id);
    state.sessions.join(session.conn_id, room.clone());
    state.sessions.send_to_room(
        &room,
        &ServerEvent::DriverAssigned {
            driver_id: session.user_id,
            ride_id,
            status: ride.status,
        },
    );

    dispatch::resolve_offers(state, ride_id, session.user_id);

    info!(
        ride_id = %ride_id,
        driver_id = %session.user_id,
        "ride accepted"
    );
    Ok(())
}

fn update_location(
    state: &AppState,
    session: SessionContext,
    location: GeoPoint,
) -> Result<(), AppError> {
    validate_point(&location, "location")?;

    if session.role == Role::Driver {
        state.drivers.update_location(session.user_id, location);
    }

    let event = ServerEvent::LocationUpdate {
        user_id: session.user_id,
        location,
        timestamp: Utc::now(),
    };
    for ride in state.rides.active_for(session.user_id) {
        state
            .sessions
            .send_to_room_except(&ride_room(ride.id), session.conn_id, &event);
    }
    Ok(())
}

fn update_ride_status(
    state: &AppState,
    session: SessionContext,
    ride_id: Uuid,
    status: RideStatus,
) -> Result<(), AppError> {
    require_role(session, Role::Driver, "advance a ride")?;

    let ride = state.rides.transition(ride_id, session.user_id, status)?;
    let room = ride_room(ride_id);
    state.sessions.send_to_room(
        &room,
        &ServerEvent::RideStatusChange {
            ride_id,
            status: ride.status,
            timestamp: ride.updated_at,
        },
    );

    if ride.status == RideStatus::Completed {
        state
            .metrics
            .rides_total
            .with_label_values(&["completed"])
            .inc();
        state.sessions.drop_room(&room);
    }

    info!(ride_id = %ride_id, status = %ride.status, "ride status advanced");
    Ok(())
}

fn cancel_ride(
    state: &AppState,
    session: SessionContext,
    ride_id: Uuid,
    reason: Option<String>,
) -> Result<(), AppError> {
    let ride = state.rides.cancel(ride_id, session.user_id, reason)?;

    // candidates still holding the offer hear that it is gone
    dispatch::withdraw_offers(state, ride_id);

    let room = ride_room(ride_id);
    state.sessions.send_to_room(
        &room,
        &ServerEvent::RideStatusChange {
            ride_id,
            status: ride.status,
            timestamp: ride.updated_at,
        },
    );
    state
        .metrics
        .rides_total
        .with_label_values(&["cancelled"])
        .inc();
    state.sessions.drop_room(&room);

    info!(ride_id = %ride_id, user_id = %session.user_id, "ride cancelled");
    Ok(())
}

fn send_message(
    state: &AppState,
    session: SessionContext,
    ride_id: Uuid,
    message: String,
) -> Result<(), AppError> {
    if message.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }

    let ride = state
        .rides
        .get(ride_id)
        .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;
    if !ride.involves(session.user_id) {
        return Err(AppError::Unauthorized(
            "not a participant of this ride".to_string(),
        ));
    }

    // chat is relayed, never persisted
    state.sessions.send_to_room_except(
        &ride_room(ride_id),
        session.conn_id,
        &ServerEvent::MessageReceived {
            ride_id,
            message,
            sender_id: session.user_id,
            timestamp: Utc::now(),
        },
    );
    Ok(())
}

fn driver_status_change(
    state: &AppState,
    session: SessionContext,
    is_online: bool,
    location: Option<GeoPoint>,
) -> Result<(), AppError> {
    require_role(session, Role::Driver, "change driver status")?;

    if is_online {
        match location {
            Some(point) => {
                validate_point(&point, "location")?;
                state.drivers.set_online(session.user_id, point);
            }
            None => {
                return Err(AppError::Validation(
                    "location is required to go online".to_string(),
                ));
            }
        }
    } else {
        state.drivers.set_offline(session.user_id);
    }

    state
        .metrics
        .drivers_online
        .set(state.drivers.online_count() as i64);

    state.sessions.broadcast_all(&ServerEvent::DriverStatusUpdate {
        driver_id: session.user_id,
        is_online,
        location,
    });

    info!(
        driver_id = %session.user_id,
        is_online,
        "driver status changed"
    );
    Ok(())
}
