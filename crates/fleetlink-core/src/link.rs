//! # Vehicle link (C2)
//!
//! One bound UDP endpoint per vehicle. Learns its peer address from the first inbound
//! datagram, watches for heartbeats, and rebinds on socket loss. Generalizes the teacher's
//! `UdpServer` connection-builder idiom (bind once, learn peers from `recv_from`, track
//! liveness with a closable state) down to the single-peer case a vehicle link needs.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleetlink_proto::{Decoder, Encoder, Message};

use crate::consts::{HEARTBEAT_TIMEOUT, RECONNECT_BACKOFF, RECV_BUF_SIZE};
use crate::error::LinkError;
use crate::events::{LinkStatus, LinkStatusEvent, TelemetryUpdate};
use crate::ids::{DroneId, Uin, UserId};
use crate::snapshot::{now_epoch_ms, SnapshotCell};

/// Transport descriptor for a vehicle's link (§3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub bind_host: String,
    pub bind_port: u16,
}

/// Connection protocol, per §3. Only `udp`/`udpin` are connectable today (§4.2.1); `tcp` is
/// accepted by validation but not yet wired to a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    UdpIn,
    Udp,
    Tcp,
}

impl Protocol {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "udpin" => Some(Self::UdpIn),
            "udp" => Some(Self::Udp),
            "tcp" => Some(Self::Tcp),
            _ => None,
        }
    }
}

/// A single vehicle's live connection: socket, learned peer, telemetry snapshot, and
/// lifecycle status.
pub struct VehicleLink {
    drone_id: DroneId,
    user_id: UserId,
    uin: Uin,
    name: String,
    endpoint: Endpoint,
    socket: RwLock<Arc<UdpSocket>>,
    /// Learned from inbound traffic, or an operator override (§9 Open Questions).
    peer_addr: StdMutex<Option<SocketAddr>>,
    peer_override: Option<SocketAddr>,
    /// `(sysid, compid)` of the remote flight controller, learned from its frames. Used as
    /// `target_system`/`target_component` on outbound commands.
    remote_ids: StdMutex<Option<(u8, u8)>>,
    status_tx: watch::Sender<LinkStatus>,
    status_rx: watch::Receiver<LinkStatus>,
    snapshot: SnapshotCell,
    encoder: StdMutex<Encoder>,
    cancel: CancellationToken,
}

impl VehicleLink {
    /// Binds the socket and spawns the receive loop. Returns once bound; the loop itself
    /// runs in the background until [`VehicleLink::disconnect`] is called.
    pub async fn connect(
        drone_id: DroneId,
        user_id: UserId,
        uin: Uin,
        name: String,
        endpoint: Endpoint,
        snapshot: SnapshotCell,
        peer_override: Option<SocketAddr>,
        telemetry_tx: broadcast::Sender<TelemetryUpdate>,
        status_tx: broadcast::Sender<LinkStatusEvent>,
    ) -> Result<Arc<Self>, LinkError> {
        if !matches!(endpoint.protocol, Protocol::Udp | Protocol::UdpIn) {
            return Err(LinkError::UnsupportedProtocol(format!(
                "{:?}",
                endpoint.protocol
            )));
        }

        let bind_addr = format!("{}:{}", endpoint.bind_host, endpoint.bind_port);
        let socket = UdpSocket::bind(&bind_addr)
            .await
            .map_err(|e| LinkError::BindFailed(bind_addr.clone(), e))?;

        let (status_watch_tx, status_watch_rx) = watch::channel(LinkStatus::Connecting);

        let link = Arc::new(Self {
            drone_id,
            user_id,
            uin,
            name,
            endpoint,
            socket: RwLock::new(Arc::new(socket)),
            peer_addr: StdMutex::new(None),
            peer_override,
            remote_ids: StdMutex::new(None),
            status_tx: status_watch_tx,
            status_rx: status_watch_rx,
            snapshot,
            encoder: StdMutex::new(Encoder::new()),
            cancel: CancellationToken::new(),
        });

        link.publish_status(&status_tx, LinkStatus::Connecting, None);

        let task_link = link.clone();
        tokio::spawn(async move {
            task_link.run(telemetry_tx, status_tx).await;
        });

        Ok(link)
    }

    pub fn drone_id(&self) -> DroneId {
        self.drone_id
    }

    pub fn status(&self) -> LinkStatus {
        *self.status_rx.borrow()
    }

    /// The address commands are sent to: an operator override if configured, otherwise the
    /// learned peer (§9 Open Questions resolves the precedence this way).
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_override.or(*self.peer_addr.lock().unwrap())
    }

    /// `(sysid, compid)` last observed from the flight controller's own frames, if any.
    pub fn remote_ids(&self) -> Option<(u8, u8)> {
        *self.remote_ids.lock().unwrap()
    }

    /// Sends a pre-built message to the learned (or overridden) peer. Best-effort: no ack,
    /// no retry at this layer (§4.2).
    pub async fn send(&self, message: &Message) -> Result<(), LinkError> {
        let peer = self.peer_addr().ok_or(LinkError::PeerUnknown)?;
        let bytes = {
            let mut enc = self.encoder.lock().unwrap();
            enc.encode(message)?
        };
        let socket = self.socket.read().await.clone();
        socket.send_to(&bytes, peer).await?;
        Ok(())
    }

    /// Idempotent: cancels the receive loop and marks the link disconnected. Safe to call
    /// more than once.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    fn publish_status(
        &self,
        status_tx: &broadcast::Sender<LinkStatusEvent>,
        status: LinkStatus,
        reason: Option<String>,
    ) {
        let _ = self.status_tx.send(status);
        let _ = status_tx.send(LinkStatusEvent {
            drone_id: self.drone_id,
            user_id: self.user_id,
            status,
            reason,
        });
    }

    async fn run(
        self: Arc<Self>,
        telemetry_tx: broadcast::Sender<TelemetryUpdate>,
        status_tx: broadcast::Sender<LinkStatusEvent>,
    ) {
        loop {
            match self.serve_until_loss(&telemetry_tx, &status_tx).await {
                LoopExit::Cancelled => {
                    self.publish_status(&status_tx, LinkStatus::Disconnected, None);
                    return;
                }
                LoopExit::HeartbeatTimeout => {
                    self.publish_status(
                        &status_tx,
                        LinkStatus::Disconnected,
                        Some("HeartbeatTimeout".to_string()),
                    );
                    // Per §9, timeout does not auto-reconnect; an explicit reconnect call
                    // is required.
                    return;
                }
                LoopExit::SocketLost => {
                    self.publish_status(&status_tx, LinkStatus::Reconnecting, None);
                    if !self.rebind_until_ready().await {
                        return; // cancelled while reconnecting
                    }
                }
            }
        }
    }

    async fn rebind_until_ready(&self) -> bool {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
            }

            let bind_addr = format!("{}:{}", self.endpoint.bind_host, self.endpoint.bind_port);
            match UdpSocket::bind(&bind_addr).await {
                Ok(socket) => {
                    *self.socket.write().await = Arc::new(socket);
                    info!(drone_id = %self.drone_id, "rebound vehicle link after socket loss");
                    return true;
                }
                Err(err) => {
                    warn!(drone_id = %self.drone_id, %err, "rebind attempt failed, retrying");
                }
            }
        }
    }

    async fn serve_until_loss(
        &self,
        telemetry_tx: &broadcast::Sender<TelemetryUpdate>,
        status_tx: &broadcast::Sender<LinkStatusEvent>,
    ) -> LoopExit {
        let socket = self.socket.read().await.clone();
        let mut decoder = Decoder::new();
        let mut buf = vec![0u8; RECV_BUF_SIZE];
        let mut deadline = Instant::now() + HEARTBEAT_TIMEOUT;
        let mut connected_announced = false;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return LoopExit::Cancelled,
                _ = tokio::time::sleep_until(deadline.into()) => return LoopExit::HeartbeatTimeout,
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, addr)) => {
                            self.note_peer(addr);
                            decoder.feed(&buf[..n]);
                            while let Some(frame) = decoder.next_frame() {
                                self.note_remote_ids(frame.sysid, frame.compid);
                                if matches!(frame.message, Message::Heartbeat(_)) {
                                    deadline = Instant::now() + HEARTBEAT_TIMEOUT;
                                    if !connected_announced {
                                        connected_announced = true;
                                        self.publish_status(status_tx, LinkStatus::Connected, None);
                                    }
                                }
                                self.apply_frame(&frame.message);
                                let _ = telemetry_tx.send(TelemetryUpdate {
                                    drone_id: self.drone_id,
                                    user_id: self.user_id,
                                    uin: self.uin.clone(),
                                    name: self.name.clone(),
                                    snapshot: self.snapshot.get(),
                                });
                            }
                        }
                        Err(err) => {
                            warn!(drone_id = %self.drone_id, %err, "vehicle socket error, entering reconnect");
                            return LoopExit::SocketLost;
                        }
                    }
                }
            }
        }
    }

    fn note_peer(&self, addr: SocketAddr) {
        let mut guard = self.peer_addr.lock().unwrap();
        if *guard != Some(addr) {
            if guard.is_some() {
                debug!(drone_id = %self.drone_id, new_peer = %addr, "peer address changed");
            }
            *guard = Some(addr);
        }
    }

    fn note_remote_ids(&self, sysid: u8, compid: u8) {
        *self.remote_ids.lock().unwrap() = Some((sysid, compid));
    }

    fn apply_frame(&self, message: &Message) {
        let now = now_epoch_ms();
        match message {
            Message::Heartbeat(hb) => {
                self.snapshot.update(|s| {
                    s.armed = hb.armed();
                    s.mode = hb.mode();
                    s.last_update_epoch_ms = now;
                });
            }
            Message::GlobalPositionInt(gpi) => {
                self.snapshot.update(|s| {
                    s.lat = gpi.lat_deg;
                    s.lon = gpi.lon_deg;
                    s.alt_msl_m = gpi.alt_msl_m;
                    s.alt_rel_m = gpi.relative_alt_m;
                    s.heading_deg = gpi.heading_deg as i16;
                    s.last_update_epoch_ms = now;
                });
            }
            Message::VfrHud(hud) => {
                self.snapshot.update(|s| {
                    s.air_speed_mps = hud.airspeed_mps;
                    s.ground_speed_mps = hud.groundspeed_mps;
                    s.throttle_pct = hud.throttle_pct;
                    s.heading_deg = hud.heading_deg;
                    s.last_update_epoch_ms = now;
                });
            }
            Message::GpsRawInt(gps) => {
                self.snapshot.update(|s| {
                    s.satellites = gps.satellites_visible;
                    s.last_update_epoch_ms = now;
                });
            }
            Message::BatteryStatus(bat) if bat.battery_remaining >= 0 => {
                self.snapshot.update(|s| {
                    s.battery_pct = bat.battery_remaining as u8;
                    s.last_update_epoch_ms = now;
                });
            }
            Message::SysStatus(sys) if sys.battery_remaining >= 0 => {
                self.snapshot.update(|s| {
                    s.battery_pct = sys.battery_remaining as u8;
                    s.last_update_epoch_ms = now;
                });
            }
            // Decode failures are counted upstream by the decoder; other known-but-inbound-
            // only variants (command acks) and unknown ids don't affect the snapshot.
            _ => {}
        }
    }
}

enum LoopExit {
    Cancelled,
    HeartbeatTimeout,
    SocketLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_parses_known_strings() {
        assert_eq!(Protocol::parse("udp"), Some(Protocol::Udp));
        assert_eq!(Protocol::parse("udpin"), Some(Protocol::UdpIn));
        assert_eq!(Protocol::parse("tcp"), Some(Protocol::Tcp));
        assert_eq!(Protocol::parse("bogus"), None);
    }
}
