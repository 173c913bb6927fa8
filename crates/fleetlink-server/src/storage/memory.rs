//! # In-memory storage test double (§4.8)
//!
//! Fills `fleetlink_core::Storage` with a `Mutex`-guarded in-process store. Not a real
//! collaborator — no durability, no relational constraints beyond what's checked here — just
//! enough to run the server and its integration tests without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use fleetlink_core::{
    DroneId, DroneStatusRow, Event, NewSession, SessionEnd, SessionId, Storage, StorageError,
};

#[derive(Default)]
pub struct InMemoryStorage {
    drone_status: Mutex<HashMap<DroneId, DroneStatusRow>>,
    sessions: Mutex<HashMap<SessionId, NewSession>>,
    ended_sessions: Mutex<HashMap<SessionId, SessionEnd>>,
    events: Mutex<Vec<Event>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn drone_status_of(&self, drone_id: DroneId) -> Option<DroneStatusRow> {
        self.drone_status.lock().unwrap().get(&drone_id).copied()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_drone_status(&self, drone_id: DroneId, status: DroneStatusRow) -> Result<(), StorageError> {
        self.drone_status.lock().unwrap().insert(drone_id, status);
        Ok(())
    }

    async fn start_session(&self, session: &NewSession) -> Result<(), StorageError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn end_session(&self, session_id: SessionId, end: &SessionEnd) -> Result<(), StorageError> {
        if !self.sessions.lock().unwrap().contains_key(&session_id) {
            return Err(StorageError::Permanent(format!(
                "end_session for unknown session {session_id}"
            )));
        }
        self.ended_sessions.lock().unwrap().insert(session_id, end.clone());
        Ok(())
    }

    async fn record_event(&self, event: &Event) -> Result<(), StorageError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    /// Startup recovery (§6): a fresh in-memory store has no rows to flip, so this is a
    /// no-op — it exists to satisfy the trait and to match what a real collaborator does on
    /// every restart.
    async fn mark_all_offline(&self) -> Result<(), StorageError> {
        let mut statuses = self.drone_status.lock().unwrap();
        for status in statuses.values_mut() {
            *status = DroneStatusRow::Offline;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetlink_core::{GeoPoint, SessionStatus, UserId};

    fn session(session_id: SessionId, drone_id: DroneId) -> NewSession {
        NewSession {
            session_id,
            user_id: UserId(uuid::Uuid::new_v4()),
            drone_id,
            mission_id: None,
            started_at_epoch_ms: 0,
            start_battery: 90,
            start_point: Some(GeoPoint { lat: 0.0, lon: 0.0 }),
        }
    }

    #[tokio::test]
    async fn ending_an_unknown_session_is_a_permanent_failure() {
        let storage = InMemoryStorage::new();
        let end = SessionEnd {
            ended_at_epoch_ms: 1,
            end_battery: Some(10),
            end_point: None,
            max_altitude_m: 0.0,
            max_speed_mps: 0.0,
            avg_speed_mps: 0.0,
            total_distance_m: 0.0,
            status: SessionStatus::Completed,
        };
        let err = storage
            .end_session(SessionId::new(), &end)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Permanent(_)));
    }

    #[tokio::test]
    async fn mark_all_offline_flips_every_known_drone() {
        let storage = InMemoryStorage::new();
        storage
            .upsert_drone_status(DroneId(1), DroneStatusRow::Flying)
            .await
            .unwrap();
        storage.mark_all_offline().await.unwrap();
        assert_eq!(storage.drone_status_of(DroneId(1)), Some(DroneStatusRow::Offline));
    }

    #[tokio::test]
    async fn start_then_end_session_round_trips() {
        let storage = InMemoryStorage::new();
        let session_id = SessionId::new();
        storage.start_session(&session(session_id, DroneId(1))).await.unwrap();
        let end = SessionEnd {
            ended_at_epoch_ms: 5,
            end_battery: Some(50),
            end_point: None,
            max_altitude_m: 10.0,
            max_speed_mps: 3.0,
            avg_speed_mps: 2.0,
            total_distance_m: 100.0,
            status: SessionStatus::Completed,
        };
        storage.end_session(session_id, &end).await.unwrap();
    }
}
