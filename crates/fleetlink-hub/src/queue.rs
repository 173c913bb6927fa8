//! # Subscriber outbound queue (§5)
//!
//! A bounded ring: operator messages, `connected`/`disconnected`, and `error` frames are
//! never dropped; when the queue is full, an incoming *telemetry* frame instead evicts the
//! oldest queued telemetry frame. Generalizes the teacher's `core::utils::ring::RingBuffer`
//! (a fixed-capacity circular buffer that reports what it evicted) to two priority classes
//! sharing one capacity budget instead of one.

use std::collections::VecDeque;

use crate::vocabulary::{Frame, Outbound};

/// Bounded outbound queue for one subscriber channel.
///
/// Critical frames (§5: operator messages, `connected`/`disconnected`, `error`) always fit —
/// pushing one grows past `capacity` rather than drop it. Telemetry frames respect the cap:
/// once `capacity` total frames are queued, a new telemetry frame evicts the oldest queued
/// telemetry frame (never a critical one) before being pushed.
pub struct OutboundQueue {
    capacity: usize,
    items: VecDeque<Frame>,
    dropped_telemetry: u64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(256)),
            dropped_telemetry: 0,
        }
    }

    /// Total telemetry frames dropped over this queue's lifetime, for metrics/logging.
    pub fn dropped_telemetry(&self) -> u64 {
        self.dropped_telemetry
    }

    /// Enqueues `frame`, applying the drop policy above. Returns `true` unless a telemetry
    /// frame had to be dropped to make room for itself (queue already full of non-telemetry
    /// critical frames, so there's nothing droppable left).
    pub fn push(&mut self, frame: Frame) -> bool {
        let is_telemetry = !frame.message.is_critical();

        if frame.message.is_critical() || self.items.len() < self.capacity {
            self.items.push_back(frame);
            return true;
        }

        // At capacity and this is telemetry: evict the oldest queued telemetry frame, if
        // any, to make room; critical frames already queued are never evicted.
        if let Some(pos) = self.items.iter().position(|f| !f.message.is_critical()) {
            self.items.remove(pos);
            self.items.push_back(frame);
            if is_telemetry {
                self.dropped_telemetry += 1;
            }
            true
        } else {
            // Queue is full of critical frames; still accept rather than silently drop an
            // operator/error frame, matching the "never dropped" guarantee for those kinds.
            self.items.push_back(frame);
            true
        }
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(n: u8) -> Frame {
        Frame::new(Outbound::Telemetry {
            drone_id: fleetlink_core::DroneId(n as u64),
            name: format!("rover-{n}"),
            snapshot: fleetlink_core::TelemetrySnapshot::default(),
        })
    }

    fn error(msg: &str) -> Frame {
        Frame::new(Outbound::Error { message: msg.to_string() })
    }

    #[test]
    fn telemetry_overflow_drops_oldest_telemetry() {
        let mut queue = OutboundQueue::new(2);
        queue.push(telemetry(1));
        queue.push(telemetry(2));
        queue.push(telemetry(3));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped_telemetry(), 1);
        let first = queue.pop().unwrap();
        match first.message {
            Outbound::Telemetry { drone_id, .. } => assert_eq!(drone_id, fleetlink_core::DroneId(2)),
            _ => panic!("expected telemetry"),
        }
    }

    #[test]
    fn critical_frames_are_never_dropped_even_past_capacity() {
        let mut queue = OutboundQueue::new(1);
        queue.push(telemetry(1));
        queue.push(error("one"));
        queue.push(error("two"));

        // All three survive: critical frames are appended unconditionally (growing past
        // capacity) and never evict anything themselves; only a *new telemetry* frame would
        // have evicted the queued telemetry frame, and none arrived here.
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped_telemetry(), 0);
    }
}
