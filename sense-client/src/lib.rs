//! Client library for the Sense home energy monitoring service.
//!
//! [`SenseClient`] covers the whole surface: login (with multi-factor
//! completion), authenticated REST calls with transparent access token
//! renewal, and the realtime push feed with automatic reconnection.
//!
//! Sessions are plain data. The client publishes
//! [`ClientEvent::SessionChanged`] whenever its session changes; persisting
//! it and passing it back to [`SenseClientBuilder::session`] on the next
//! run is up to the caller.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod realtime;
pub mod session;
pub mod timestamp;
pub mod token;
pub mod tracing;
pub mod types;

#[cfg(test)]
mod test_support;

pub use auth::LoginOutcome;
pub use client::{SenseClient, SenseClientBuilder};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use events::{ClientEvent, EventEmitter, EventKind, ListenerId};
pub use realtime::RealtimeState;
pub use session::Session;
