use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Ephemeral presence record for one driver. Lives only as long as the
/// process; a driver that disconnects is marked offline, not removed, so the
/// last known location survives for diagnostics but is never matchable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPresence {
    pub driver_id: Uuid,
    pub location: GeoPoint,
    pub is_online: bool,
    pub updated_at: DateTime<Utc>,
}
