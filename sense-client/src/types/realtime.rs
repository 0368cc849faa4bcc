use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A message from the realtime feed, keyed by its `type` field.
///
/// The feed delivers raw JSON in [`ClientEvent::RealtimeUpdate`]; use
/// [`RealtimePayload::from_value`] to get a typed view.
///
/// [`ClientEvent::RealtimeUpdate`]: crate::ClientEvent::RealtimeUpdate
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RealtimePayload {
    MonitorInfo(Value),
    Hello(Value),
    DataChange(DataChangePayload),
    RealtimeUpdate(RealtimeUpdatePayload),
    DeviceStates(Value),
}

impl RealtimePayload {
    /// Typed view of a raw feed message.
    ///
    /// Fails for message types this crate does not know.
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        Self::deserialize(value)
    }
}

/// Periodic power reading, several per second.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RealtimeUpdatePayload {
    pub frame: u64,
    pub epoch: i64,
    /// Total consumption in watts
    pub w: f64,
    pub c: f64,
    pub grid_w: f64,
    pub d_w: f64,
    pub hz: Option<f64>,
    pub voltage: Vec<f64>,
    pub channels: Vec<f64>,
    pub devices: Vec<RealtimeDevice>,
    pub deltas: Vec<RealtimeUpdateDelta>,
    #[serde(rename = "defaultCost")]
    pub default_cost: Option<f64>,
    pub power_flow: Option<Value>,
    #[serde(rename = "_stats")]
    pub stats: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RealtimeUpdateDelta {
    pub frame: u64,
    pub channel: u32,
    pub start_frame: u64,
    pub w: f64,
}

/// A device's share of the current reading.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RealtimeDevice {
    pub id: String,
    pub name: String,
    pub w: f64,
    pub c: f64,
    pub attrs: Vec<String>,
    pub tags: Map<String, Value>,
    /// Smart-plug readings, when the device reports them
    pub sd: Option<RealtimeDeviceState>,
    pub ao_w: Option<f64>,
    pub ao_st: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RealtimeDeviceState {
    pub w: Option<f64>,
    pub i: Option<f64>,
    pub v: Option<f64>,
    pub e: Option<f64>,
    pub intensity: Option<f64>,
    pub extra: Option<Value>,
}

/// Notice that server-side data (devices, settings) changed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DataChangePayload {
    pub user_version: Option<u64>,
    pub settings_version: Option<u64>,
    pub partner_checksum: Option<String>,
    pub monitor_overview_checksum: Option<String>,
    pub device_data_checksum: Option<String>,
    pub pending_events: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_realtime_update_from_value() {
        let value = json!({
            "type": "realtime_update",
            "payload": {
                "frame": 42,
                "epoch": 1700000000,
                "w": 1520.5,
                "grid_w": 1520,
                "devices": [{"id": "fridge", "name": "Fridge", "w": 120.0}]
            }
        });

        let RealtimePayload::RealtimeUpdate(update) = RealtimePayload::from_value(&value).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(update.frame, 42);
        assert_eq!(update.w, 1520.5);
        assert_eq!(update.devices[0].name, "Fridge");
        assert_eq!(update.devices[0].sd, None);
    }

    #[test]
    fn test_hello_keeps_raw_payload() {
        let value = json!({"type": "hello", "payload": {"online": true}});
        assert_eq!(
            RealtimePayload::from_value(&value).unwrap(),
            RealtimePayload::Hello(json!({"online": true}))
        );
    }

    #[test]
    fn test_unknown_type_is_error() {
        let value = json!({"type": "mystery", "payload": {}});
        assert!(RealtimePayload::from_value(&value).is_err());
    }
}
