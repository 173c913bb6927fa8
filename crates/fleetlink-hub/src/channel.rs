//! # Subscriber channel (C6)
//!
//! One [`SubscriberChannel`] per persistent client connection. Holds the principal's
//! identity once authenticated, an outbound dispatcher task, and the `open → authenticating
//! → authenticated → closed` state machine of §3. Transport-agnostic: the binary crate's
//! websocket (or whatever) adapter only needs to call [`SubscriberChannel::enqueue`] and
//! drain [`SubscriberChannel::outbound`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use fleetlink_core::UserId;

use crate::queue::OutboundQueue;
use crate::vocabulary::{Frame, Outbound};

/// Default capacity of a subscriber's outbound ring (§5).
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity for a subscriber channel, unique within one process's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl ChannelId {
    fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A persistent subscriber channel: `{ principal_id?, is_admin, authenticated, opened_at }`
/// per §4.6, plus the bounded outbound queue and wake signal its dispatcher drains.
pub struct SubscriberChannel {
    id: ChannelId,
    principal_id: AsyncMutex<Option<UserId>>,
    is_admin: AtomicBool,
    authenticated: AtomicBool,
    opened_at: Instant,
    queue: AsyncMutex<OutboundQueue>,
    notify: tokio::sync::Notify,
    cancel: CancellationToken,
}

impl SubscriberChannel {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId::next(),
            principal_id: AsyncMutex::new(None),
            is_admin: AtomicBool::new(false),
            authenticated: AtomicBool::new(false),
            opened_at: Instant::now(),
            queue: AsyncMutex::new(OutboundQueue::new(capacity)),
            notify: tokio::sync::Notify::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin.load(Ordering::Acquire)
    }

    pub async fn principal_id(&self) -> Option<UserId> {
        *self.principal_id.lock().await
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Moves the channel into `authenticated`, recording the caller's identity.
    pub async fn authenticate(&self, principal: UserId, is_admin: bool) {
        *self.principal_id.lock().await = Some(principal);
        self.is_admin.store(is_admin, Ordering::Release);
        self.authenticated.store(true, Ordering::Release);
    }

    /// Whether this channel should receive telemetry for a drone owned by `owner`:
    /// `c.authenticated ∧ (c.is_admin ∨ c.principal_id == owner)` (§4.6).
    pub async fn sees_owner(&self, owner: UserId) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        self.is_admin() || self.principal_id().await == Some(owner)
    }

    /// Queues `message` for delivery, applying the drop policy of §5. Wakes the dispatcher.
    pub async fn enqueue(&self, message: Outbound) {
        let mut queue = self.queue.lock().await;
        queue.push(Frame::new(message));
        drop(queue);
        self.notify.notify_one();
    }

    /// Pops the next queued frame, waiting for one (or cancellation) if the queue is empty.
    /// Returns `None` once the channel is closed and drained.
    pub async fn next_outbound(&self) -> Option<Frame> {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(frame) = queue.pop() {
                    return Some(frame);
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let mut queue = self.queue.lock().await;
                    return queue.pop();
                }
                _ = self.notify.notified() => {}
            }
        }
    }

    pub fn close(&self) {
        self.cancel.cancel();
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unauthenticated_channel_sees_nobody() {
        let channel = SubscriberChannel::new();
        assert!(!channel.sees_owner(UserId(uuid::Uuid::new_v4())).await);
    }

    #[tokio::test]
    async fn authenticated_owner_sees_itself_but_not_other_owners() {
        let channel = SubscriberChannel::new();
        let owner = UserId(uuid::Uuid::new_v4());
        let other = UserId(uuid::Uuid::new_v4());
        channel.authenticate(owner, false).await;

        assert!(channel.sees_owner(owner).await);
        assert!(!channel.sees_owner(other).await);
    }

    #[tokio::test]
    async fn admin_sees_every_owner() {
        let channel = SubscriberChannel::new();
        channel.authenticate(UserId(uuid::Uuid::new_v4()), true).await;
        assert!(channel.sees_owner(UserId(uuid::Uuid::new_v4())).await);
    }

    #[tokio::test]
    async fn enqueue_then_drain_round_trips_a_frame() {
        let channel = SubscriberChannel::new();
        channel.enqueue(Outbound::Error { message: "hi".into() }).await;
        let frame = channel.next_outbound().await.unwrap();
        assert!(matches!(frame.message, Outbound::Error { .. }));
    }
}
