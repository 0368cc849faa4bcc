//! Realtime feed.
//!
//! A monitor pushes readings over a long-lived WebSocket. [`Connector`]
//! opens the socket and turns it into a stream of [`ChannelEvent`]s;
//! [`RealtimeController`] runs the connection state machine on top of it.

mod channel;
mod controller;

pub use channel::{Channel, ChannelEvent, Connector, TungsteniteConnector};
pub use controller::{RealtimeController, RealtimeState};
