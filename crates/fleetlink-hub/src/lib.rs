//! # fleetlink-hub
//!
//! The authenticated subscriber fan-out hub (C6) and the thin command surface (C7) built on
//! top of [`fleetlink_core::DroneManager`]. Transport-agnostic: this crate knows nothing
//! about websockets, TCP framing, or HTTP — it exposes [`SubscriberChannel`] as a queue a
//! transport adapter drains, and [`commands`] as plain functions a request handler calls.

mod channel;
pub mod commands;
mod error;
mod hub;
mod queue;
mod vocabulary;

pub use channel::{ChannelId, SubscriberChannel, DEFAULT_QUEUE_CAPACITY};
pub use error::HubError;
pub use hub::SubscriberHub;
pub use queue::OutboundQueue;
pub use vocabulary::{Frame, Inbound, Outbound};

pub mod prelude {
    pub use crate::{
        commands, ChannelId, Frame, HubError, Inbound, Outbound, SubscriberChannel, SubscriberHub,
    };
}
