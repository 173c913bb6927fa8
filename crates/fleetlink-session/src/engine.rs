//! # Session + event engine (C5)
//!
//! One task, owning one `HashMap<DroneId, ActiveSession>`, consuming the manager's typed
//! telemetry and link-status broadcasts directly — no locks, since nothing outside this
//! task ever touches session state. Modeled on the teacher's per-connection event-handler
//! tasks (`asnc::network::conn_handler`), which likewise own their state outright and
//! communicate only through channels.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fleetlink_core::{
    now_epoch_ms, DroneId, DroneStatusRow, Event, EventKind, GeoPoint, LinkStatus, LinkStatusEvent,
    NewSession, SessionEnd, SessionStatus, Storage, StorageError, TelemetryUpdate,
    BATTERY_LOW_PCT, EVENT_CHAN_CAPACITY, EVENT_COOLDOWN,
};

use crate::error::SessionError;
use crate::state::ActiveSession;

/// A geofence violation, reported by a collaborator outside this crate (§4.5 — zone
/// violations are "supplied externally", never derived from telemetry).
#[derive(Clone, Debug)]
pub struct ZoneReport {
    pub drone_id: DroneId,
    pub point: GeoPoint,
    pub message: String,
}

/// Handle to a running [`SessionEngine`]: lets callers subscribe to the (undebounced)
/// event stream and report zone violations, without owning engine state themselves.
#[derive(Clone)]
pub struct SessionEngineHandle {
    event_tx: broadcast::Sender<Event>,
    zone_tx: mpsc::Sender<ZoneReport>,
}

impl SessionEngineHandle {
    /// Every trigger evaluation, whether or not it was persisted (§4.5: instantaneous
    /// state changes emit immediately for operator UX, debouncing only gates storage).
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub async fn report_zone_violation(&self, drone_id: DroneId, point: GeoPoint, message: String) {
        let _ = self.zone_tx.send(ZoneReport { drone_id, point, message }).await;
    }
}

pub struct SessionEngine {
    storage: Arc<dyn Storage>,
    sessions: HashMap<DroneId, ActiveSession>,
    event_tx: broadcast::Sender<Event>,
    cooldown: Duration,
}

impl SessionEngine {
    /// Spawns the engine task and returns a handle plus its `JoinHandle`. A permanent
    /// storage failure ends the task; its result is the health-check signal (§7).
    pub fn spawn(
        storage: Arc<dyn Storage>,
        telemetry_rx: broadcast::Receiver<TelemetryUpdate>,
        status_rx: broadcast::Receiver<LinkStatusEvent>,
        cancel: CancellationToken,
    ) -> (SessionEngineHandle, JoinHandle<Result<(), SessionError>>) {
        let (event_tx, _) = broadcast::channel(EVENT_CHAN_CAPACITY);
        let (zone_tx, zone_rx) = mpsc::channel(32);

        let engine = SessionEngine {
            storage,
            sessions: HashMap::new(),
            event_tx: event_tx.clone(),
            cooldown: EVENT_COOLDOWN,
        };
        let handle = SessionEngineHandle { event_tx, zone_tx };
        let join = tokio::spawn(engine.run(telemetry_rx, status_rx, zone_rx, cancel));
        (handle, join)
    }

    async fn run(
        mut self,
        mut telemetry_rx: broadcast::Receiver<TelemetryUpdate>,
        mut status_rx: broadcast::Receiver<LinkStatusEvent>,
        mut zone_rx: mpsc::Receiver<ZoneReport>,
        cancel: CancellationToken,
    ) -> Result<(), SessionError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("session engine shutting down");
                    return Ok(());
                }
                result = telemetry_rx.recv() => {
                    match result {
                        Ok(update) => self.handle_telemetry(update).await?,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "session engine lagged behind telemetry stream");
                        }
                        Err(broadcast::error::RecvError::Closed) => return Ok(()),
                    }
                }
                result = status_rx.recv() => {
                    match result {
                        Ok(event) => self.handle_status(event).await?,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "session engine lagged behind status stream");
                        }
                        Err(broadcast::error::RecvError::Closed) => return Ok(()),
                    }
                }
                Some(report) = zone_rx.recv() => {
                    self.handle_zone_violation(report).await?;
                }
            }
        }
    }

    async fn handle_telemetry(&mut self, update: TelemetryUpdate) -> Result<(), SessionError> {
        let now_ms = now_epoch_ms();
        let now = Instant::now();

        if !self.sessions.contains_key(&update.drone_id) {
            self.start_session(&update, now_ms).await?;
        }

        let mut to_persist = Vec::new();
        let mut drone_status_update = None;
        if let Some(session) = self.sessions.get_mut(&update.drone_id) {
            session.accumulate(&update.snapshot);

            let mut triggered: Vec<(EventKind, String)> = Vec::new();
            if update.snapshot.armed && update.snapshot.alt_rel_m > 5.0 {
                triggered.push((EventKind::Takeoff, "takeoff detected".to_string()));
                drone_status_update = Some(DroneStatusRow::Flying);
            }
            if !update.snapshot.armed && update.snapshot.alt_rel_m < 2.0 {
                triggered.push((EventKind::Landing, "landing detected".to_string()));
                session.landed_cleanly = true;
                drone_status_update = Some(DroneStatusRow::Connected);
            }
            if let Some(prior_mode) = session.prior_snapshot.as_ref().map(|s| s.mode) {
                if prior_mode != update.snapshot.mode {
                    triggered.push((
                        EventKind::ModeChange,
                        format!("mode changed to {}", update.snapshot.mode),
                    ));
                }
            }
            if update.snapshot.battery_pct < BATTERY_LOW_PCT {
                triggered.push((EventKind::BatteryLow, "battery low".to_string()));
            }

            for (kind, message) in triggered {
                let event = Event {
                    session_id: session.session_id,
                    user_id: session.user_id,
                    drone_id: session.drone_id,
                    mission_id: session.mission_id.clone(),
                    timestamp_epoch_ms: now_ms,
                    kind,
                    point: Some(GeoPoint { lat: update.snapshot.lat, lon: update.snapshot.lon }),
                    altitude_m: Some(update.snapshot.alt_rel_m),
                    battery_pct: Some(update.snapshot.battery_pct),
                    speed_mps: Some(update.snapshot.ground_speed_mps),
                    mode: Some(update.snapshot.mode.to_string()),
                    message,
                };
                let _ = self.event_tx.send(event.clone());
                if session.due_for_persistence(kind, now, self.cooldown) {
                    to_persist.push(event);
                }
            }

            session.prior_snapshot = Some(update.snapshot.clone());
        }

        for event in to_persist {
            self.write_through(self.storage.record_event(&event).await).await?;
        }
        if let Some(status) = drone_status_update {
            self.write_through(self.storage.upsert_drone_status(update.drone_id, status).await)
                .await?;
        }
        Ok(())
    }

    async fn start_session(&mut self, update: &TelemetryUpdate, now_ms: u64) -> Result<(), SessionError> {
        let session = ActiveSession::new(update.drone_id, update.user_id, &update.snapshot, now_ms);
        let new_session = NewSession {
            session_id: session.session_id,
            user_id: session.user_id,
            drone_id: session.drone_id,
            mission_id: session.mission_id.clone(),
            started_at_epoch_ms: session.started_at_epoch_ms,
            start_battery: session.start_battery,
            start_point: session.start_point,
        };
        self.sessions.insert(update.drone_id, session);
        self.write_through(self.storage.start_session(&new_session).await).await?;
        self.write_through(
            self.storage
                .upsert_drone_status(update.drone_id, DroneStatusRow::Connected)
                .await,
        )
        .await?;

        let started = Event {
            session_id: new_session.session_id,
            user_id: new_session.user_id,
            drone_id: new_session.drone_id,
            mission_id: new_session.mission_id.clone(),
            timestamp_epoch_ms: now_ms,
            kind: EventKind::SessionStarted,
            point: new_session.start_point,
            altitude_m: Some(update.snapshot.alt_rel_m),
            battery_pct: Some(new_session.start_battery),
            speed_mps: Some(update.snapshot.ground_speed_mps),
            mode: Some(update.snapshot.mode.to_string()),
            message: "session started".to_string(),
        };
        let _ = self.event_tx.send(started.clone());
        self.write_through(self.storage.record_event(&started).await).await?;
        Ok(())
    }

    async fn handle_status(&mut self, event: LinkStatusEvent) -> Result<(), SessionError> {
        if event.status != LinkStatus::Disconnected {
            return Ok(());
        }
        self.write_through(
            self.storage
                .upsert_drone_status(event.drone_id, DroneStatusRow::Offline)
                .await,
        )
        .await?;
        let Some(session) = self.sessions.remove(&event.drone_id) else {
            return Ok(());
        };

        let now_ms = now_epoch_ms();
        let (end_battery, end_point) = match &session.prior_snapshot {
            Some(s) => (Some(s.battery_pct), Some(GeoPoint { lat: s.lat, lon: s.lon })),
            None => (None, None),
        };

        if let Some(end_battery) = end_battery {
            if end_battery > session.start_battery {
                tracing::warn!(
                    drone_id = %session.drone_id,
                    start_battery = session.start_battery,
                    end_battery,
                    "end battery exceeds start battery, clamping battery_used to 0"
                );
            }
        }

        let status = if session.landed_cleanly {
            SessionStatus::Completed
        } else {
            SessionStatus::Aborted
        };
        let end = SessionEnd {
            ended_at_epoch_ms: now_ms,
            end_battery,
            end_point,
            max_altitude_m: session.max_altitude_m,
            max_speed_mps: session.max_speed_mps,
            avg_speed_mps: session.avg_speed_mps(),
            total_distance_m: session.total_distance_m(),
            status,
        };
        self.write_through(self.storage.end_session(session.session_id, &end).await)
            .await?;

        let ended = Event {
            session_id: session.session_id,
            user_id: session.user_id,
            drone_id: session.drone_id,
            mission_id: session.mission_id.clone(),
            timestamp_epoch_ms: now_ms,
            kind: EventKind::SessionEnded,
            point: end_point,
            altitude_m: None,
            battery_pct: end_battery,
            speed_mps: None,
            mode: None,
            message: format!("session ended: {status:?}"),
        };
        let _ = self.event_tx.send(ended.clone());
        self.write_through(self.storage.record_event(&ended).await).await?;
        Ok(())
    }

    async fn handle_zone_violation(&mut self, report: ZoneReport) -> Result<(), SessionError> {
        let now_ms = now_epoch_ms();
        let now = Instant::now();
        let cooldown = self.cooldown;
        let Some(session) = self.sessions.get_mut(&report.drone_id) else {
            return Ok(());
        };
        let due = session.due_for_persistence(EventKind::ZoneViolation, now, cooldown);
        let event = Event {
            session_id: session.session_id,
            user_id: session.user_id,
            drone_id: session.drone_id,
            mission_id: session.mission_id.clone(),
            timestamp_epoch_ms: now_ms,
            kind: EventKind::ZoneViolation,
            point: Some(report.point),
            altitude_m: None,
            battery_pct: None,
            speed_mps: None,
            mode: None,
            message: report.message,
        };
        let _ = self.event_tx.send(event.clone());
        if due {
            self.write_through(self.storage.record_event(&event).await).await?;
        }
        Ok(())
    }

    /// §7's drop policy: a transient storage failure is logged and swallowed so telemetry
    /// never blocks; a permanent one stops the engine.
    async fn write_through(&self, result: Result<(), StorageError>) -> Result<(), SessionError> {
        match result {
            Ok(()) => Ok(()),
            Err(StorageError::Transient(msg)) => {
                tracing::warn!(error = %msg, "transient storage failure, dropping write");
                Ok(())
            }
            Err(StorageError::Permanent(msg)) => Err(SessionError::StoragePermanent(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fleetlink_core::{DroneStatusRow, FlightMode, NewSession, SessionEnd, SessionId, Storage, StorageError, TelemetrySnapshot, UserId};

    use super::*;

    #[derive(Default)]
    struct RecordingStorage {
        started: Mutex<Vec<NewSession>>,
        ended: Mutex<Vec<(SessionId, SessionEnd)>>,
        events: Mutex<Vec<Event>>,
        drone_status: Mutex<Vec<(DroneId, DroneStatusRow)>>,
    }

    #[async_trait]
    impl Storage for RecordingStorage {
        async fn upsert_drone_status(&self, drone_id: DroneId, status: DroneStatusRow) -> Result<(), StorageError> {
            self.drone_status.lock().unwrap().push((drone_id, status));
            Ok(())
        }

        async fn start_session(&self, session: &NewSession) -> Result<(), StorageError> {
            self.started.lock().unwrap().push(session.clone());
            Ok(())
        }

        async fn end_session(&self, session_id: SessionId, end: &SessionEnd) -> Result<(), StorageError> {
            self.ended.lock().unwrap().push((session_id, end.clone()));
            Ok(())
        }

        async fn record_event(&self, event: &Event) -> Result<(), StorageError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn mark_all_offline(&self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn update(drone_id: DroneId, user_id: UserId, armed: bool, alt_rel: f32, battery: u8, t_ms: u64) -> TelemetryUpdate {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.armed = armed;
        snapshot.alt_rel_m = alt_rel;
        snapshot.battery_pct = battery;
        snapshot.last_update_epoch_ms = t_ms;
        snapshot.mode = FlightMode::Stabilize;
        TelemetryUpdate {
            drone_id,
            user_id,
            uin: fleetlink_core::Uin("U1".to_string()),
            name: "rover".to_string(),
            snapshot,
        }
    }

    #[tokio::test]
    async fn first_telemetry_update_opens_a_session() {
        let storage = Arc::new(RecordingStorage::default());
        let (telemetry_tx, telemetry_rx) = broadcast::channel(16);
        let (_status_tx, status_rx) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let (handle, join) = SessionEngine::spawn(storage.clone(), telemetry_rx, status_rx, cancel.clone());
        let mut events = handle.subscribe_events();

        let user = UserId(uuid::Uuid::new_v4());
        telemetry_tx
            .send(update(DroneId(1), user, false, 0.0, 80, 0))
            .unwrap();

        let evt = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event within timeout")
            .unwrap();
        assert_eq!(evt.kind, EventKind::SessionStarted);
        assert_eq!(storage.started.lock().unwrap().len(), 1);

        cancel.cancel();
        join.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn disconnect_ends_the_active_session() {
        let storage = Arc::new(RecordingStorage::default());
        let (telemetry_tx, telemetry_rx) = broadcast::channel(16);
        let (status_tx, status_rx) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let (_handle, join) = SessionEngine::spawn(storage.clone(), telemetry_rx, status_rx, cancel.clone());

        let user = UserId(uuid::Uuid::new_v4());
        let drone_id = DroneId(7);
        telemetry_tx.send(update(drone_id, user, false, 0.0, 80, 0)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        status_tx
            .send(LinkStatusEvent { drone_id, user_id: user, status: LinkStatus::Disconnected, reason: None })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(storage.ended.lock().unwrap().len(), 1);
        let has_ended_event = storage
            .events
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.kind == EventKind::SessionEnded);
        assert!(has_ended_event);
        assert!(storage
            .drone_status
            .lock()
            .unwrap()
            .iter()
            .any(|(id, status)| *id == drone_id && *status == DroneStatusRow::Offline));

        cancel.cancel();
        join.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn takeoff_marks_the_drone_row_flying() {
        let storage = Arc::new(RecordingStorage::default());
        let (telemetry_tx, telemetry_rx) = broadcast::channel(16);
        let (_status_tx, status_rx) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let (_handle, join) = SessionEngine::spawn(storage.clone(), telemetry_rx, status_rx, cancel.clone());

        let user = UserId(uuid::Uuid::new_v4());
        let drone_id = DroneId(3);
        telemetry_tx.send(update(drone_id, user, false, 0.0, 80, 0)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        telemetry_tx.send(update(drone_id, user, true, 10.0, 79, 1)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(storage
            .drone_status
            .lock()
            .unwrap()
            .iter()
            .any(|(id, status)| *id == drone_id && *status == DroneStatusRow::Flying));

        cancel.cancel();
        join.await.unwrap().unwrap();
    }
}
