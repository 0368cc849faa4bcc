use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A device detected by a monitor, from `GET /app/monitors/{id}/devices`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub icon: DeviceIcon,
    /// Free-form metadata (`DeviceCount`, `UserDeviceType`, `Revoked`, ...)
    pub tags: Map<String, Value>,
    pub location: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub monitor_id: Option<u64>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub count: Option<u32>,
    pub stage: Option<String>,
}

/// Icon identifier, e.g. `fridge` or `solar_alt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DeviceIcon(pub String);

impl Device {
    /// The `UserDeviceType` tag, falling back to `DefaultUserDeviceType`.
    pub fn user_device_type(&self) -> Option<&str> {
        self.tags
            .get("UserDeviceType")
            .or_else(|| self.tags.get("DefaultUserDeviceType"))
            .and_then(Value::as_str)
    }
}
