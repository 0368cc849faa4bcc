use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use time::{Duration, OffsetDateTime, PrimitiveDateTime, Time};

/// Aggregation period for `GET /app/history/trends`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Deserialize, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendScale {
    Day,
    Week,
    Month,
    Year,
    /// Billing cycle; the period start is computed as for [`TrendScale::Day`]
    Cycle,
}

impl TrendScale {
    /// Start of the period containing `at`, in `at`'s own offset.
    ///
    /// Weeks start on Monday.
    pub fn period_start(self, at: OffsetDateTime) -> OffsetDateTime {
        let date = at.date();
        let first_day = match self {
            TrendScale::Day | TrendScale::Cycle => date,
            TrendScale::Week => {
                date - Duration::days(i64::from(date.weekday().number_days_from_monday()))
            }
            TrendScale::Month => date - Duration::days(i64::from(date.day()) - 1),
            TrendScale::Year => date - Duration::days(i64::from(date.ordinal()) - 1),
        };
        PrimitiveDateTime::new(first_day, Time::MIDNIGHT).assume_offset(at.offset())
    }
}

/// Response of `GET /app/history/trends`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Trends {
    pub steps: u32,
    pub start: Option<String>,
    pub end: Option<String>,
    pub scale: Option<String>,
    pub consumption: TrendsConsumption,
    pub production: TrendsProduction,
    pub net_production: Option<f64>,
    pub production_pct: Option<f64>,
    /// Flow and comparison fields that are usually null
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrendsConsumption {
    pub total: f64,
    pub totals: Vec<f64>,
    pub devices: Vec<TrendsDevice>,
    pub total_cost: Option<f64>,
    pub total_costs: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrendsProduction {
    pub total: f64,
    pub total_cost: Option<f64>,
}

/// Per-device usage over a trends period.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrendsDevice {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub tags: Map<String, Value>,
    pub location: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub monitor_id: Option<u64>,
    pub history: Vec<f64>,
    pub avgw: f64,
    pub total_kwh: f64,
    pub total_cost: Option<f64>,
    pub pct: f64,
    pub cost_history: Vec<f64>,
    pub given_location: Option<String>,
    pub given_make: Option<String>,
    pub given_model: Option<String>,
}
