//! Wire types for the Sense REST API and realtime feed.
//!
//! These mirror the JSON the service sends. Only the fields the client
//! itself reads (identity, tokens, monitor ids, the realtime `type` tag)
//! are required; everything else defaults when absent so a server-side
//! schema change does not break deserialization.

mod auth;
mod device;
mod monitor;
mod realtime;
mod trends;

pub use auth::{AuthenticationResponse, MfaChallenge, RenewResponse};
pub use device::{Device, DeviceIcon};
pub use monitor::{Monitor, MonitorAttributes, MonitorOverview, MonitorOverviewDetails};
pub use realtime::{
    DataChangePayload, RealtimeDevice, RealtimeDeviceState, RealtimePayload,
    RealtimeUpdateDelta, RealtimeUpdatePayload,
};
pub use trends::{Trends, TrendsConsumption, TrendsDevice, TrendsProduction, TrendScale};
