use std::collections::HashSet;
use std::fmt;

use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use super::events::ServerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Rider,
    Driver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Rider => f.write_str("rider"),
            Role::Driver => f.write_str("driver"),
        }
    }
}

struct Session {
    user_id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
}

/// Room naming: a user's personal room is their user id; a ride room is
/// `ride_<ride id>`.
pub fn ride_room(ride_id: Uuid) -> String {
    format!("ride_{ride_id}")
}

/// Connection-to-identity mapping plus room membership, shared across every
/// connection handler. Delivery is non-blocking: a session whose buffer is
/// full loses the event rather than stalling the sender's handler.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Session>,
    rooms: DashMap<String, HashSet<Uuid>>,
    memberships: DashMap<Uuid, HashSet<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Registers a connection and joins it to its personal room.
    pub fn register(&self, conn_id: Uuid, user_id: Uuid, tx: mpsc::Sender<ServerEvent>) {
        self.sessions.insert(conn_id, Session { user_id, tx });
        self.join(conn_id, user_id.to_string());
    }

    /// Removes a connection from every room it joined, then drops the session.
    pub fn unregister(&self, conn_id: Uuid) {
        if let Some((_, joined)) = self.memberships.remove(&conn_id) {
            for room in joined {
                if let Some(mut members) = self.rooms.get_mut(&room) {
                    members.remove(&conn_id);
                }
                self.rooms.remove_if(&room, |_, members| members.is_empty());
            }
        }
        self.sessions.remove(&conn_id);
    }

    pub fn join(&self, conn_id: Uuid, room: String) {
        self.rooms.entry(room.clone()).or_default().insert(conn_id);
        self.memberships.entry(conn_id).or_default().insert(room);
    }

    /// Dissolves a room entirely, e.g. when its ride reaches a terminal state.
    pub fn drop_room(&self, room: &str) {
        if let Some((_, members)) = self.rooms.remove(room) {
            for conn_id in members {
                if let Some(mut joined) = self.memberships.get_mut(&conn_id) {
                    joined.remove(room);
                }
            }
        }
    }

    pub fn send_to_conn(&self, conn_id: Uuid, event: &ServerEvent) {
        if let Some(session) = self.sessions.get(&conn_id) {
            if let Err(err) = session.tx.try_send(event.clone()) {
                warn!(
                    conn_id = %conn_id,
                    user_id = %session.user_id,
                    error = %err,
                    "dropping event for slow session"
                );
            }
        }
    }

    /// Delivery to a user's personal room (all of their live connections).
    pub fn send_to_user(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        self.send_to_room(&user_id.to_string(), event)
    }

    pub fn send_to_room(&self, room: &str, event: &ServerEvent) -> usize {
        let members = self.room_members(room);
        for conn_id in &members {
            self.send_to_conn(*conn_id, event);
        }
        members.len()
    }

    pub fn send_to_room_except(&self, room: &str, skip: Uuid, event: &ServerEvent) -> usize {
        let members = self.room_members(room);
        let mut delivered = 0;
        for conn_id in members {
            if conn_id != skip {
                self.send_to_conn(conn_id, event);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn broadcast_all(&self, event: &ServerEvent) {
        let connections: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for conn_id in connections {
            self.send_to_conn(conn_id, event);
        }
    }

    pub fn connected_count(&self) -> usize {
        self.sessions.len()
    }

    // Snapshot the member set so no room lock is held while delivering.
    fn room_members(&self, room: &str) -> Vec<Uuid> {
        match self.rooms.get(room) {
            Some(members) => members.iter().copied().collect(),
            None => Vec::new(),
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
