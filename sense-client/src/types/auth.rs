use serde::{Deserialize, Serialize};

use super::Monitor;

/// Body of a successful `/authenticate` or `/authenticate/mfa` call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuthenticationResponse {
    pub user_id: u64,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub monitors: Vec<Monitor>,
    #[serde(default)]
    pub authorized: bool,
    #[serde(default)]
    pub account_id: Option<u64>,
    #[serde(default)]
    pub bridge_server: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub totp_enabled: bool,
    #[serde(default)]
    pub ab_cohort: Option<String>,
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Body of a 401 from `/authenticate` when a second factor is needed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MfaChallenge {
    pub mfa_token: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub mfa_type: Option<String>,
    #[serde(default)]
    pub error_reason: Option<String>,
}

/// Body of a successful `/renew` call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RenewResponse {
    pub access_token: String,
    pub refresh_token: String,
}
