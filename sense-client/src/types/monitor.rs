use serde::{Deserialize, Serialize};

/// A Sense energy monitor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Monitor {
    pub id: u64,
    pub serial_number: Option<String>,
    pub time_zone: Option<String>,
    pub date_created: Option<String>,
    pub solar_connected: bool,
    pub solar_configured: bool,
    pub online: bool,
    pub hardware_type: Option<String>,
    pub ethernet_supported: bool,
    pub power_over_ethernet_supported: bool,
    pub zigbee_supported: bool,
    pub aux_ignore: bool,
    pub aux_port: Option<String>,
    pub signal_check_completed_time: Option<String>,
    pub attributes: Option<MonitorAttributes>,
}

/// Household and tariff settings attached to a monitor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorAttributes {
    pub id: u64,
    pub name: Option<String>,
    pub state: Option<String>,
    pub cost: Option<f64>,
    pub sell_back_rate: Option<f64>,
    pub user_set_cost: Option<bool>,
    pub cycle_start: Option<u32>,
    pub home_type: Option<String>,
    pub home_size_type: Option<String>,
    pub year_built_type: Option<String>,
    pub number_of_occupants: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    /// Either a plain number or a regional tariff object
    pub electricity_cost: Option<serde_json::Value>,
    pub show_cost: Option<bool>,
    pub tou_enabled: Option<bool>,
    pub solar_tou_enabled: Option<bool>,
    pub power_region: Option<String>,
    pub to_grid_threshold: Option<f64>,
    pub panel: Option<String>,
}

/// Response of `GET /app/monitors/{id}/overview`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorOverview {
    pub checksum: Option<String>,
    pub device_data_checksum: Option<String>,
    pub monitor_overview: MonitorOverviewDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorOverviewDetails {
    pub monitor: Monitor,
    pub ndi_enabled: bool,
    pub local_api_enabled: bool,
    pub partner_channel: Option<String>,
    pub partner_tags: Vec<String>,
    pub num_devices: u32,
    pub num_named_devices: u32,
    pub num_unnamed_devices: u32,
    pub notify_weak_connection: bool,
}
