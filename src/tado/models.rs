#![allow(dead_code)]

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Token  —  POST https://auth.tado.com/oauth/token
// ---------------------------------------------------------------------------

/// Successful password-grant token response.
///
/// Only `access_token` is read; the token never outlives the run, so the
/// expiry and refresh fields are carried for completeness only.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Token type, always `"bearer"`.
    pub token_type: Option<String>,

    /// Validity period in seconds (typically 599).
    pub expires_in: Option<i64>,

    pub refresh_token: Option<String>,

    pub scope: Option<String>,
}

// ---------------------------------------------------------------------------
// Account  —  GET /api/v2/me
// ---------------------------------------------------------------------------

/// Subset of the `/me` response: the homes the account can see.
#[derive(Debug, Deserialize)]
pub struct User {
    pub homes: Vec<HomeRef>,

    pub name: Option<String>,

    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HomeRef {
    pub id: i64,

    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Zone state  —  GET /api/v2/homes/{home_id}/zones/{zone}/state
// ---------------------------------------------------------------------------

/// Subset of a zone state response: the sensor data points.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneState {
    pub sensor_data_points: SensorDataPoints,

    /// Zone mode, e.g. `"HOME"` or `"AWAY"`.
    pub tado_mode: Option<String>,
}

/// A zone's measured values. Either data point can be absent while the
/// device is (re)connecting.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDataPoints {
    pub inside_temperature: Option<TemperatureDataPoint>,

    pub humidity: Option<PercentageDataPoint>,
}

#[derive(Debug, Deserialize)]
pub struct TemperatureDataPoint {
    pub celsius: f64,

    pub fahrenheit: Option<f64>,

    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PercentageDataPoint {
    /// Relative humidity in percent.
    pub percentage: f64,

    pub timestamp: Option<String>,
}
