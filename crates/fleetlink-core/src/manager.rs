//! # Drone manager (C4)
//!
//! Keyed registries (`by_id`, `by_owner`, `by_uin`) behind reader-preferring locks — writes
//! (register/connect/disconnect) are rare, reads are the per-message hot path and must stay
//! cheap (§5). Generalizes the teacher's single `peers: RwLock<HashMap<...>>` node registry
//! to three indices over the same vehicle set.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tokio::sync::broadcast;

use fleetlink_proto::{FlightMode, Message};

use crate::commands;
use crate::consts::EVENT_CHAN_CAPACITY;
use crate::error::ManagerError;
use crate::events::{LinkStatus, LinkStatusEvent, MessageTarget, OperatorMessage, TelemetryUpdate};
use crate::ids::{DroneId, Uin, UserId};
use crate::link::{Endpoint, VehicleLink};
use crate::snapshot::{SnapshotCell, TelemetrySnapshot};

use std::sync::Arc;

/// A read-only summary of one registered vehicle, for listing endpoints (e.g. `/admin/drones`)
/// that need every vehicle's identity and status without exposing the live link itself.
#[derive(Clone, Debug, serde::Serialize)]
pub struct DroneSummary {
    pub drone_id: DroneId,
    pub user_id: UserId,
    pub name: String,
    pub uin: Uin,
    pub status: LinkStatus,
}

/// A registered vehicle's static identity plus its current (possibly absent) live link.
pub struct VehicleRecord {
    pub drone_id: DroneId,
    pub user_id: UserId,
    pub name: String,
    pub uin: Uin,
    pub endpoint: Endpoint,
    pub peer_override: Option<SocketAddr>,
    pub snapshot: SnapshotCell,
    link: Option<Arc<VehicleLink>>,
}

impl VehicleRecord {
    /// Best-known status: the live link's status if connected, `Registered` otherwise.
    pub fn status(&self) -> LinkStatus {
        self.link
            .as_ref()
            .map(|l| l.status())
            .unwrap_or(LinkStatus::Registered)
    }
}

/// Registry of vehicle links, indexed three ways, plus the typed broadcast channels every
/// vehicle's telemetry and lifecycle events are republished on.
pub struct DroneManager {
    next_id: AtomicU64,
    by_id: RwLock<HashMap<DroneId, VehicleRecord>>,
    by_owner: RwLock<HashMap<UserId, HashSet<DroneId>>>,
    by_uin: RwLock<HashMap<Uin, DroneId>>,
    telemetry_tx: broadcast::Sender<TelemetryUpdate>,
    status_tx: broadcast::Sender<LinkStatusEvent>,
    operator_tx: broadcast::Sender<OperatorMessage>,
}

impl Default for DroneManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DroneManager {
    pub fn new() -> Self {
        let (telemetry_tx, _) = broadcast::channel(EVENT_CHAN_CAPACITY);
        let (status_tx, _) = broadcast::channel(EVENT_CHAN_CAPACITY);
        let (operator_tx, _) = broadcast::channel(EVENT_CHAN_CAPACITY);
        Self {
            next_id: AtomicU64::new(1),
            by_id: RwLock::new(HashMap::new()),
            by_owner: RwLock::new(HashMap::new()),
            by_uin: RwLock::new(HashMap::new()),
            telemetry_tx,
            status_tx,
            operator_tx,
        }
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryUpdate> {
        self.telemetry_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<LinkStatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_operator_messages(&self) -> broadcast::Receiver<OperatorMessage> {
        self.operator_tx.subscribe()
    }

    /// Registers a new vehicle. Fails `UinConflict` if `uin` is already registered.
    pub fn register(
        &self,
        user_id: UserId,
        name: String,
        uin: Uin,
        endpoint: Endpoint,
        peer_override: Option<SocketAddr>,
    ) -> Result<DroneId, ManagerError> {
        let mut by_uin = self.by_uin.write().unwrap();
        if by_uin.contains_key(&uin) {
            return Err(ManagerError::UinConflict(uin));
        }

        let drone_id = DroneId(self.next_id.fetch_add(1, Ordering::SeqCst));
        by_uin.insert(uin.clone(), drone_id);
        drop(by_uin);

        self.by_owner
            .write()
            .unwrap()
            .entry(user_id)
            .or_default()
            .insert(drone_id);

        self.by_id.write().unwrap().insert(
            drone_id,
            VehicleRecord {
                drone_id,
                user_id,
                name,
                uin,
                endpoint,
                peer_override,
                snapshot: SnapshotCell::default(),
                link: None,
            },
        );

        Ok(drone_id)
    }

    /// Creates a link and starts its receive loop. Idempotent if already connected.
    pub async fn connect(&self, drone_id: DroneId) -> Result<(), ManagerError> {
        let (user_id, uin, name, endpoint, snapshot, peer_override, already_live) = {
            let guard = self.by_id.read().unwrap();
            let record = guard
                .get(&drone_id)
                .ok_or(ManagerError::NotFound(drone_id))?;
            let already_live = record
                .link
                .as_ref()
                .map(|l| !matches!(l.status(), LinkStatus::Disconnected))
                .unwrap_or(false);
            (
                record.user_id,
                record.uin.clone(),
                record.name.clone(),
                record.endpoint.clone(),
                record.snapshot.clone(),
                record.peer_override,
                already_live,
            )
        };

        if already_live {
            return Ok(());
        }

        let link = VehicleLink::connect(
            drone_id,
            user_id,
            uin,
            name,
            endpoint,
            snapshot,
            peer_override,
            self.telemetry_tx.clone(),
            self.status_tx.clone(),
        )
        .await
        .map_err(ManagerError::Link)?;

        let mut guard = self.by_id.write().unwrap();
        if let Some(record) = guard.get_mut(&drone_id) {
            record.link = Some(link);
        }
        Ok(())
    }

    /// Idempotent: cancels the vehicle's receive loop if one is running.
    pub fn disconnect(&self, drone_id: DroneId) -> Result<(), ManagerError> {
        let guard = self.by_id.read().unwrap();
        let record = guard
            .get(&drone_id)
            .ok_or(ManagerError::NotFound(drone_id))?;
        if let Some(link) = &record.link {
            link.disconnect();
        }
        Ok(())
    }

    pub fn arm(&self, drone_id: DroneId) -> Result<(), ManagerError> {
        self.send_arm_disarm(drone_id, true)
    }

    pub fn disarm(&self, drone_id: DroneId) -> Result<(), ManagerError> {
        self.send_arm_disarm(drone_id, false)
    }

    fn send_arm_disarm(&self, drone_id: DroneId, arm: bool) -> Result<(), ManagerError> {
        let link = self.live_link(drone_id)?;
        let msg = commands::arm_disarm(link.remote_ids(), arm);
        spawn_send(link, msg);
        Ok(())
    }

    pub fn set_mode(&self, drone_id: DroneId, mode_name: &str) -> Result<(), ManagerError> {
        let mode = FlightMode::from_name(mode_name)
            .ok_or_else(|| ManagerError::UnknownMode(mode_name.to_string()))?;
        let link = self.live_link(drone_id)?;
        let msg = commands::set_mode(link.remote_ids(), mode);
        spawn_send(link, msg);
        Ok(())
    }

    /// Resolves the caller's single connected drone, used by the command surface when a
    /// request doesn't name a `drone_id` explicitly.
    pub fn resolve_by_owner(&self, user_id: UserId) -> Option<DroneId> {
        let owned = self.by_owner.read().unwrap().get(&user_id)?.clone();
        let guard = self.by_id.read().unwrap();
        owned
            .into_iter()
            .find(|id| matches!(guard.get(id).map(|r| r.status()), Some(LinkStatus::Connected)))
    }

    /// Resolves the drone the caller means to bring up a connection on: one of their
    /// registered vehicles matching `endpoint` if given, falling back to their single
    /// registered drone when there's exactly one and no endpoint was supplied. Unlike
    /// [`Self::resolve_by_owner`] this does not require the drone to already be connected,
    /// since its purpose is to select the target of a `connect` request.
    pub fn resolve_owned_for_connect(&self, user_id: UserId, endpoint: Option<&Endpoint>) -> Option<DroneId> {
        let owned = self.by_owner.read().unwrap().get(&user_id)?.clone();
        let guard = self.by_id.read().unwrap();
        if let Some(endpoint) = endpoint {
            if let Some(id) = owned
                .iter()
                .find(|id| guard.get(id).map(|r| &r.endpoint) == Some(endpoint))
            {
                return Some(*id);
            }
        }
        if owned.len() == 1 {
            return owned.into_iter().next();
        }
        None
    }

    /// Owner of `drone_id`, if registered.
    pub fn owner_of(&self, drone_id: DroneId) -> Option<UserId> {
        self.by_id.read().unwrap().get(&drone_id).map(|r| r.user_id)
    }

    pub fn snapshot_of(&self, drone_id: DroneId) -> Option<TelemetrySnapshot> {
        self.by_id
            .read()
            .unwrap()
            .get(&drone_id)
            .map(|r| r.snapshot.get())
    }

    pub fn status_of(&self, drone_id: DroneId) -> Option<LinkStatus> {
        self.by_id.read().unwrap().get(&drone_id).map(|r| r.status())
    }

    /// Every registered vehicle, for admin listing endpoints (§6's `/admin/drones`).
    pub fn list_all(&self) -> Vec<DroneSummary> {
        self.by_id
            .read()
            .unwrap()
            .values()
            .map(|r| DroneSummary {
                drone_id: r.drone_id,
                user_id: r.user_id,
                name: r.name.clone(),
                uin: r.uin.clone(),
                status: r.status(),
            })
            .collect()
    }

    pub fn send_operator_message(&self, text: String, importance: crate::events::Importance, target: MessageTarget) {
        let _ = self.operator_tx.send(OperatorMessage {
            text,
            importance,
            target,
        });
    }

    fn live_link(&self, drone_id: DroneId) -> Result<Arc<VehicleLink>, ManagerError> {
        let guard = self.by_id.read().unwrap();
        let record = guard
            .get(&drone_id)
            .ok_or(ManagerError::NotFound(drone_id))?;
        let link = record
            .link
            .clone()
            .ok_or(ManagerError::NotConnected(drone_id))?;
        // `Connecting`/`Connected`/`Reconnecting` all mean a link task is alive; only a
        // `Disconnected` link is actually `NotConnected`. A live link with no learned peer
        // yet is the `PeerUnknown` case (scenario 5).
        if link.status() == LinkStatus::Disconnected {
            return Err(ManagerError::NotConnected(drone_id));
        }
        if link.peer_addr().is_none() {
            return Err(ManagerError::PeerUnknown(drone_id));
        }
        Ok(link)
    }
}

/// Commands are fire-and-forget from the caller's perspective once accepted (§4.2 — best
/// effort, no retry at the link layer), but the actual socket write is async; spawn it so
/// manager methods stay synchronous for callers that don't want to await a datagram write.
fn spawn_send(link: Arc<VehicleLink>, msg: Message) {
    tokio::spawn(async move {
        if let Err(err) = link.send(&msg).await {
            tracing::warn!(drone_id = %link.drone_id(), %err, "failed to send command");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Protocol;

    fn endpoint() -> Endpoint {
        Endpoint {
            protocol: Protocol::Udp,
            bind_host: "127.0.0.1".to_string(),
            bind_port: 0,
        }
    }

    #[test]
    fn register_assigns_unique_ids_and_rejects_duplicate_uin() {
        let manager = DroneManager::new();
        let user = UserId(uuid::Uuid::new_v4());
        let uin = Uin("UIN-1".to_string());

        let first = manager
            .register(user, "rover-1".into(), uin.clone(), endpoint(), None)
            .unwrap();
        let err = manager
            .register(user, "rover-2".into(), uin, endpoint(), None)
            .unwrap_err();

        assert!(matches!(err, ManagerError::UinConflict(_)));
        assert_eq!(manager.owner_of(first), Some(user));
    }

    #[test]
    fn list_all_reflects_every_registration() {
        let manager = DroneManager::new();
        let user = UserId(uuid::Uuid::new_v4());
        manager
            .register(user, "rover-1".into(), Uin("L1".into()), endpoint(), None)
            .unwrap();
        manager
            .register(user, "rover-2".into(), Uin("L2".into()), endpoint(), None)
            .unwrap();

        let summaries = manager.list_all();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.status == LinkStatus::Registered));
    }

    #[test]
    fn resolve_owned_for_connect_matches_the_named_endpoint() {
        let manager = DroneManager::new();
        let user = UserId(uuid::Uuid::new_v4());
        let other = Endpoint {
            protocol: Protocol::Udp,
            bind_host: "10.0.0.1".to_string(),
            bind_port: 14551,
        };
        manager
            .register(user, "rover-1".into(), Uin("M1".into()), endpoint(), None)
            .unwrap();
        let second = manager
            .register(user, "rover-2".into(), Uin("M2".into()), other.clone(), None)
            .unwrap();

        let resolved = manager.resolve_owned_for_connect(user, Some(&other));
        assert_eq!(resolved, Some(second));
    }

    #[test]
    fn resolve_owned_for_connect_falls_back_to_the_sole_registration() {
        let manager = DroneManager::new();
        let user = UserId(uuid::Uuid::new_v4());
        let drone_id = manager
            .register(user, "rover".into(), Uin("M3".into()), endpoint(), None)
            .unwrap();

        assert_eq!(manager.resolve_owned_for_connect(user, None), Some(drone_id));
    }

    #[test]
    fn resolve_owned_for_connect_is_none_when_ambiguous_and_unmatched() {
        let manager = DroneManager::new();
        let user = UserId(uuid::Uuid::new_v4());
        manager
            .register(user, "rover-1".into(), Uin("M4".into()), endpoint(), None)
            .unwrap();
        manager
            .register(user, "rover-2".into(), Uin("M5".into()), endpoint(), None)
            .unwrap();

        let unmatched = Endpoint {
            protocol: Protocol::Tcp,
            bind_host: "192.168.0.1".to_string(),
            bind_port: 1,
        };
        assert_eq!(manager.resolve_owned_for_connect(user, Some(&unmatched)), None);
    }

    #[test]
    fn unregistered_drone_operations_fail_not_found() {
        let manager = DroneManager::new();
        let err = manager.arm(DroneId(9999)).unwrap_err();
        assert!(matches!(err, ManagerError::NotFound(_)));
    }

    #[test]
    fn arm_before_connect_is_not_connected() {
        let manager = DroneManager::new();
        let user = UserId(uuid::Uuid::new_v4());
        let drone_id = manager
            .register(user, "rover".into(), Uin("U".into()), endpoint(), None)
            .unwrap();
        let err = manager.arm(drone_id).unwrap_err();
        assert!(matches!(err, ManagerError::NotConnected(_)));
    }
}
