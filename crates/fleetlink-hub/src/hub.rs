//! # Subscriber hub (C6)
//!
//! Owns the registry of live subscriber channels and republishes [`TelemetryUpdate`] and
//! [`OperatorMessage`] events from the manager's broadcast channels onto each channel's
//! outbound queue, applying §4.6's fan-out filter. The registry itself is a copy-on-write
//! snapshot (§5): fan-out iterates a cloned `Arc` vector without holding any lock across an
//! `await`, mirroring how C4's registries keep writers rare and readers lock-free on the hot
//! path.

use std::sync::Arc;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use fleetlink_core::{
    DroneManager, LinkStatus, LinkStatusEvent, MessageTarget, OperatorMessage, TelemetryUpdate,
};

use crate::channel::{ChannelId, SubscriberChannel};
use crate::vocabulary::Outbound;

/// Registry of subscriber channels plus the two dispatcher tasks that drain the manager's
/// telemetry and operator-message broadcasts into per-channel outbound queues.
pub struct SubscriberHub {
    manager: Arc<DroneManager>,
    channels: RwLock<Arc<Vec<Arc<SubscriberChannel>>>>,
    cancel: CancellationToken,
}

impl SubscriberHub {
    /// Builds the hub and spawns its two fan-out dispatcher tasks, cancelled together via
    /// `cancel`.
    pub fn spawn(manager: Arc<DroneManager>, cancel: CancellationToken) -> Arc<Self> {
        let hub = Arc::new(Self {
            manager,
            channels: RwLock::new(Arc::new(Vec::new())),
            cancel,
        });

        tokio::spawn(hub.clone().run_telemetry_fanout());
        tokio::spawn(hub.clone().run_operator_fanout());
        tokio::spawn(hub.clone().run_status_fanout());

        hub
    }

    /// Registers a new subscriber channel and returns it. The channel starts unauthenticated
    /// (§3/§4.6); the caller queues the initial `status{requires_auth:true}` banner.
    pub fn register(&self) -> Arc<SubscriberChannel> {
        let channel = SubscriberChannel::new();
        let mut guard = self.channels.write().unwrap();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(channel.clone());
        *guard = Arc::new(next);
        channel
    }

    /// Removes a closed channel from the registry. Idempotent.
    pub fn unregister(&self, id: ChannelId) {
        let mut guard = self.channels.write().unwrap();
        if !guard.iter().any(|c| c.id() == id) {
            return;
        }
        let next: Vec<_> = guard.iter().filter(|c| c.id() != id).cloned().collect();
        *guard = Arc::new(next);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().unwrap().len()
    }

    fn snapshot(&self) -> Arc<Vec<Arc<SubscriberChannel>>> {
        self.channels.read().unwrap().clone()
    }

    async fn run_telemetry_fanout(self: Arc<Self>) {
        let mut rx = self.manager.subscribe_telemetry();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                update = rx.recv() => {
                    match update {
                        Ok(update) => self.dispatch_telemetry(update).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber hub lagged behind telemetry stream");
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        }
    }

    async fn run_operator_fanout(self: Arc<Self>) {
        let mut rx = self.manager.subscribe_operator_messages();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                message = rx.recv() => {
                    match message {
                        Ok(message) => self.dispatch_operator_message(message).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber hub lagged behind operator stream");
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        }
    }

    /// Delivers to channel `c` iff `c.authenticated ∧ (c.is_admin ∨ c.principal_id ==
    /// user_id)` (§4.6's fan-out filter), plus a `disconnected`/`connected` banner when the
    /// link's status itself changes — handled separately via [`Self::dispatch_link_status`].
    async fn dispatch_telemetry(&self, update: TelemetryUpdate) {
        let channels = self.snapshot();
        let message = Outbound::Telemetry {
            drone_id: update.drone_id,
            name: update.name,
            snapshot: update.snapshot,
        };
        for channel in channels.iter() {
            if channel.sees_owner(update.user_id).await {
                channel.enqueue(message.clone()).await;
            }
        }
    }

    /// `target = Drone(id)` reaches only that drone's owner; `target = AllConnected` reaches
    /// every authenticated channel (§4.6).
    async fn dispatch_operator_message(&self, message: OperatorMessage) {
        let channels = self.snapshot();
        let owner = match &message.target {
            MessageTarget::Drone(drone_id) => self.manager.owner_of(*drone_id),
            MessageTarget::AllConnected => None,
        };

        let outbound = Outbound::Message {
            text: message.text,
            importance: message.importance,
        };

        for channel in channels.iter() {
            let deliver = match (&message.target, owner) {
                (MessageTarget::AllConnected, _) => channel.is_authenticated(),
                (MessageTarget::Drone(_), Some(owner)) => channel.sees_owner(owner).await,
                (MessageTarget::Drone(_), None) => false,
            };
            if deliver {
                channel.enqueue(outbound.clone()).await;
            }
        }
    }

    async fn run_status_fanout(self: Arc<Self>) {
        let mut rx = self.manager.subscribe_status();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                event = rx.recv() => {
                    match event {
                        Ok(event) => self.dispatch_link_status(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber hub lagged behind link-status stream");
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        }
    }

    /// Surfaces a link's `connected`/`disconnected` transitions as a banner to every channel
    /// that can see its owner (§4.2's "link lifecycle errors ... notify C6").
    async fn dispatch_link_status(&self, event: LinkStatusEvent) {
        let outbound = match event.status {
            LinkStatus::Connected => Outbound::Connected {
                message: format!("drone {} connected", event.drone_id),
            },
            LinkStatus::Disconnected => Outbound::Disconnected {
                message: event
                    .reason
                    .unwrap_or_else(|| format!("drone {} disconnected", event.drone_id)),
            },
            _ => return,
        };
        let channels = self.snapshot();
        for channel in channels.iter() {
            if channel.sees_owner(event.user_id).await {
                channel.enqueue(outbound.clone()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetlink_core::{Endpoint, Importance, Protocol, TelemetrySnapshot, Uin, UserId};

    fn endpoint() -> Endpoint {
        Endpoint {
            protocol: Protocol::Udp,
            bind_host: "127.0.0.1".to_string(),
            bind_port: 0,
        }
    }

    #[tokio::test]
    async fn telemetry_only_reaches_owner_and_admin_channels() {
        let manager = Arc::new(DroneManager::new());
        let owner = UserId(uuid::Uuid::new_v4());
        let other = UserId(uuid::Uuid::new_v4());
        let drone_id = manager
            .register(owner, "rover".into(), Uin("U1".into()), endpoint(), None)
            .unwrap();

        let cancel = CancellationToken::new();
        let hub = SubscriberHub::spawn(manager.clone(), cancel.clone());

        let owner_channel = hub.register();
        owner_channel.authenticate(owner, false).await;
        let other_channel = hub.register();
        other_channel.authenticate(other, false).await;
        let admin_channel = hub.register();
        admin_channel.authenticate(UserId(uuid::Uuid::new_v4()), true).await;

        hub.dispatch_telemetry(TelemetryUpdate {
            drone_id,
            user_id: owner,
            uin: Uin("U1".into()),
            name: "rover".into(),
            snapshot: TelemetrySnapshot::default(),
        })
        .await;

        assert!(owner_channel.next_outbound().await.is_some());
        assert!(admin_channel.next_outbound().await.is_some());

        other_channel.close();
        assert!(other_channel.next_outbound().await.is_none());

        cancel.cancel();
    }

    #[tokio::test]
    async fn operator_message_to_all_connected_skips_unauthenticated_channels() {
        let manager = Arc::new(DroneManager::new());
        let cancel = CancellationToken::new();
        let hub = SubscriberHub::spawn(manager, cancel.clone());

        let authed = hub.register();
        authed.authenticate(UserId(uuid::Uuid::new_v4()), false).await;
        let anonymous = hub.register();

        hub.dispatch_operator_message(OperatorMessage {
            text: "heads up".into(),
            importance: Importance::Warning,
            target: MessageTarget::AllConnected,
        })
        .await;

        assert!(authed.next_outbound().await.is_some());
        anonymous.close();
        assert!(anonymous.next_outbound().await.is_none());

        cancel.cancel();
    }

    #[tokio::test]
    async fn disconnected_link_status_reaches_only_the_owner() {
        let manager = Arc::new(DroneManager::new());
        let owner = UserId(uuid::Uuid::new_v4());
        let drone_id = manager
            .register(owner, "rover".into(), Uin("U3".into()), endpoint(), None)
            .unwrap();
        let cancel = CancellationToken::new();
        let hub = SubscriberHub::spawn(manager, cancel.clone());

        let owner_channel = hub.register();
        owner_channel.authenticate(owner, false).await;
        let stranger_channel = hub.register();
        stranger_channel.authenticate(UserId(uuid::Uuid::new_v4()), false).await;

        hub.dispatch_link_status(LinkStatusEvent {
            drone_id,
            user_id: owner,
            status: LinkStatus::Disconnected,
            reason: Some("heartbeat timeout".into()),
        })
        .await;

        let frame = owner_channel.next_outbound().await.unwrap();
        assert!(matches!(frame.message, Outbound::Disconnected { .. }));

        stranger_channel.close();
        assert!(stranger_channel.next_outbound().await.is_none());

        cancel.cancel();
    }

    #[tokio::test]
    async fn unregister_removes_a_channel_from_future_fanout() {
        let manager = Arc::new(DroneManager::new());
        let owner = UserId(uuid::Uuid::new_v4());
        let drone_id = manager
            .register(owner, "rover".into(), Uin("U2".into()), endpoint(), None)
            .unwrap();
        let cancel = CancellationToken::new();
        let hub = SubscriberHub::spawn(manager.clone(), cancel.clone());

        let channel = hub.register();
        channel.authenticate(owner, false).await;
        assert_eq!(hub.channel_count(), 1);

        hub.unregister(channel.id());
        assert_eq!(hub.channel_count(), 0);

        hub.dispatch_telemetry(TelemetryUpdate {
            drone_id,
            user_id: owner,
            uin: Uin("U2".into()),
            name: "rover".into(),
            snapshot: TelemetrySnapshot::default(),
        })
        .await;

        channel.close();
        assert!(channel.next_outbound().await.is_none());

        cancel.cancel();
    }
}
