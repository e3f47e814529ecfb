#![allow(dead_code)]

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Generic response envelope
//
// Every Kasa cloud call wraps its payload in the same outer object:
//
// Success:  { "error_code": 0, "result": <T> }
// Failure:  { "error_code": -20601, "msg": "Password incorrect" }
//
// `result` is absent on failure; `msg` is absent on success.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct KasaResponse<T> {
    /// `0` on success; a negative service-specific code on failure.
    pub error_code: i64,

    /// Human-readable error message — present on failure.
    pub msg: Option<String>,

    /// Present on success.
    pub result: Option<T>,
}

/// API-level failure reported inside a `KasaResponse` envelope.
#[derive(Debug, Error)]
#[error("Kasa API error: code={code}, msg={msg}")]
pub struct KasaApiError {
    pub code: i64,
    pub msg: String,
}

impl<T> KasaResponse<T> {
    /// Convert into `anyhow::Result<T>`, mapping API-level failures to
    /// `KasaApiError`.
    pub fn into_result(self) -> anyhow::Result<T> {
        if self.error_code == 0 {
            self.result.ok_or_else(|| {
                anyhow!("Kasa response: error_code=0 but result field is missing")
            })
        } else {
            Err(KasaApiError {
                code: self.error_code,
                msg: self.msg.unwrap_or_else(|| "(no message)".to_owned()),
            }
            .into())
        }
    }
}

// ---------------------------------------------------------------------------
// RelayState
// ---------------------------------------------------------------------------

/// The plug's on/off output state. On the wire this is the integer 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Off,
    On,
}

impl RelayState {
    pub fn from_wire(value: i64) -> anyhow::Result<Self> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::On),
            other => Err(anyhow!("unexpected relay_state value: {other}")),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Login  —  POST {regional endpoint}
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub method: &'static str,
    pub params: LoginParams<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginParams<'a> {
    pub app_type: &'static str,
    pub cloud_user_name: &'a str,
    pub cloud_password: &'a str,
    /// Wire key is `terminalUUID`, which camelCase renaming would mangle.
    #[serde(rename = "terminalUUID")]
    pub terminal_uuid: &'static str,
}

/// Full response type: `KasaResponse<LoginResult>`.
pub type LoginResponse = KasaResponse<LoginResult>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    /// Bearer token passed as a `token` query parameter on later calls.
    pub token: String,

    pub account_id: Option<String>,

    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Device list  —  POST {regional endpoint}?token=...
// ---------------------------------------------------------------------------

/// Full response type: `KasaResponse<DeviceListResult>`.
pub type DeviceListResponse = KasaResponse<DeviceListResult>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListResult {
    pub device_list: Vec<DeviceEntry>,
}

impl DeviceListResult {
    /// Linear scan for the first entry whose alias matches exactly.
    pub fn resolve(&self, alias: &str) -> Option<DeviceHandle> {
        self.device_list
            .iter()
            .find(|d| d.alias == alias)
            .map(DeviceHandle::from)
    }
}

/// One entry from `getDeviceList`. Only the fields this service reads are
/// modeled; the endpoint returns many more.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    /// User-assigned device name, matched against the configured alias.
    pub alias: String,

    pub device_id: String,

    /// Per-device command endpoint; passthrough calls go here, not to the
    /// regional endpoint.
    pub app_server_url: String,

    pub device_model: Option<String>,

    /// 1 when the device is reachable from the cloud.
    pub status: Option<i64>,
}

/// Addressable handle for one plug, resolved once per run by alias.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    pub device_id: String,
    pub app_server_url: String,
}

impl From<&DeviceEntry> for DeviceHandle {
    fn from(entry: &DeviceEntry) -> Self {
        Self {
            device_id: entry.device_id.clone(),
            app_server_url: entry.app_server_url.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Passthrough  —  POST {device.app_server_url}?token=...
//
// The cloud relays `params.requestData` to the plug verbatim and returns
// the plug's reply in `result.responseData`. Both legs are JSON *strings*,
// not nested objects — the plug firmware double-encodes this layer of the
// protocol, so requests are serialized to a string first and responses
// must be parsed twice.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PassthroughRequest<'a> {
    pub method: &'static str,
    pub params: PassthroughParams<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassthroughParams<'a> {
    pub device_id: &'a str,

    /// Inner device command, already serialized to a JSON string.
    pub request_data: &'a str,
}

/// Full response type: `KasaResponse<PassthroughResult>`.
pub type PassthroughResponse = KasaResponse<PassthroughResult>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassthroughResult {
    /// Escaped JSON string carrying the device's actual reply.
    pub response_data: String,
}

// ---------------------------------------------------------------------------
// Inner device replies (second decode stage)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SysInfoReply {
    pub system: SysInfoSystem,
}

#[derive(Debug, Deserialize)]
pub struct SysInfoSystem {
    pub get_sysinfo: SysInfo,
}

/// Subset of `get_sysinfo` this service reads.
#[derive(Debug, Deserialize)]
pub struct SysInfo {
    /// 0 = off, 1 = on.
    pub relay_state: i64,

    pub alias: Option<String>,

    pub model: Option<String>,

    pub sw_ver: Option<String>,

    pub err_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EmeterReply {
    pub emeter: EmeterSection,
}

#[derive(Debug, Deserialize)]
pub struct EmeterSection {
    pub get_realtime: EmeterRealtime,
}

/// Instantaneous readings from the plug's energy meter (HS110 hardware v1
/// reports amps, volts, and watts as floats).
#[derive(Debug, Deserialize)]
pub struct EmeterRealtime {
    /// Current draw in amps.
    pub current: f64,

    pub voltage: Option<f64>,

    pub power: Option<f64>,

    /// Accumulated consumption in kWh.
    pub total: Option<f64>,

    pub err_code: Option<i64>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- Envelope -----------------------------------------------------------

    #[test]
    fn envelope_success_yields_result() {
        let resp: KasaResponse<LoginResult> =
            serde_json::from_str(r#"{"error_code":0,"result":{"token":"abc123"}}"#).unwrap();
        assert_eq!(resp.into_result().unwrap().token, "abc123");
    }

    #[test]
    fn envelope_failure_yields_typed_error() {
        let resp: KasaResponse<LoginResult> =
            serde_json::from_str(r#"{"error_code":-20601,"msg":"Password incorrect"}"#).unwrap();
        let err = resp.into_result().unwrap_err();
        let api = err.downcast_ref::<KasaApiError>().expect("KasaApiError");
        assert_eq!(api.code, -20601);
        assert_eq!(api.msg, "Password incorrect");
    }

    #[test]
    fn envelope_failure_without_msg() {
        let resp: KasaResponse<LoginResult> =
            serde_json::from_str(r#"{"error_code":-1}"#).unwrap();
        let err = resp.into_result().unwrap_err();
        assert!(err.to_string().contains("code=-1"));
    }

    #[test]
    fn envelope_success_without_result_errors() {
        let resp: KasaResponse<LoginResult> =
            serde_json::from_str(r#"{"error_code":0}"#).unwrap();
        assert!(resp.into_result().is_err());
    }

    // --- RelayState ---------------------------------------------------------

    #[test]
    fn relay_state_wire_roundtrip() {
        assert_eq!(RelayState::from_wire(0).unwrap(), RelayState::Off);
        assert_eq!(RelayState::from_wire(1).unwrap(), RelayState::On);
        assert_eq!(RelayState::Off.to_wire(), 0);
        assert_eq!(RelayState::On.to_wire(), 1);
    }

    #[test]
    fn relay_state_rejects_other_values() {
        assert!(RelayState::from_wire(2).is_err());
        assert!(RelayState::from_wire(-1).is_err());
    }

    // --- Login request wire keys -------------------------------------------

    #[test]
    fn login_request_uses_expected_wire_keys() {
        let req = LoginRequest {
            method: "login",
            params: LoginParams {
                app_type: "Kasa_Android",
                cloud_user_name: "user@example.com",
                cloud_password: "hunter2",
                terminal_uuid: "d5a4f1d2-0000-0000-0000-000000000000",
            },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["method"], "login");
        let params = &v["params"];
        assert_eq!(params["appType"], "Kasa_Android");
        assert_eq!(params["cloudUserName"], "user@example.com");
        assert_eq!(params["cloudPassword"], "hunter2");
        assert!(params["terminalUUID"].is_string());
        assert!(params.get("terminalUuid").is_none());
    }

    // --- Device list --------------------------------------------------------

    fn device_list() -> DeviceListResult {
        serde_json::from_str(
            r#"{
                "deviceList": [
                    {
                        "alias": "Lamp",
                        "deviceId": "800GNU001",
                        "appServerUrl": "https://eu-wap.tplinkcloud.com",
                        "deviceModel": "HS100(UK)",
                        "status": 1
                    },
                    {
                        "alias": "Dehumidifier",
                        "deviceId": "800GNU002",
                        "appServerUrl": "https://eu-wap.tplinkcloud.com",
                        "deviceModel": "HS110(UK)",
                        "status": 1
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn resolve_matches_alias_exactly() {
        let handle = device_list().resolve("Dehumidifier").unwrap();
        assert_eq!(handle.device_id, "800GNU002");
        assert_eq!(handle.app_server_url, "https://eu-wap.tplinkcloud.com");
    }

    #[test]
    fn resolve_unknown_alias_is_none() {
        assert!(device_list().resolve("Kettle").is_none());
    }

    #[test]
    fn resolve_is_case_sensitive() {
        assert!(device_list().resolve("dehumidifier").is_none());
    }

    #[test]
    fn resolve_empty_list_is_none() {
        let empty: DeviceListResult = serde_json::from_str(r#"{"deviceList":[]}"#).unwrap();
        assert!(empty.resolve("Dehumidifier").is_none());
    }

    // --- Passthrough double decode ------------------------------------------

    #[test]
    fn passthrough_sysinfo_decodes_in_two_stages() {
        // responseData is itself a JSON document, escaped into a string.
        let outer = r#"{
            "error_code": 0,
            "result": {
                "responseData": "{\"system\":{\"get_sysinfo\":{\"sw_ver\":\"1.2.6\",\"model\":\"HS110(UK)\",\"alias\":\"Dehumidifier\",\"relay_state\":1,\"err_code\":0}}}"
            }
        }"#;
        let resp: PassthroughResponse = serde_json::from_str(outer).unwrap();
        let raw = resp.into_result().unwrap().response_data;

        let reply: SysInfoReply = serde_json::from_str(&raw).unwrap();
        let info = reply.system.get_sysinfo;
        assert_eq!(info.relay_state, 1);
        assert_eq!(info.alias.as_deref(), Some("Dehumidifier"));
        assert_eq!(info.err_code, Some(0));
    }

    #[test]
    fn passthrough_emeter_decodes_in_two_stages() {
        let outer = r#"{
            "error_code": 0,
            "result": {
                "responseData": "{\"emeter\":{\"get_realtime\":{\"current\":2.454101,\"voltage\":239.121,\"power\":561.1,\"total\":104.278,\"err_code\":0}}}"
            }
        }"#;
        let resp: PassthroughResponse = serde_json::from_str(outer).unwrap();
        let raw = resp.into_result().unwrap().response_data;

        let reply: EmeterReply = serde_json::from_str(&raw).unwrap();
        let rt = reply.emeter.get_realtime;
        assert_eq!(rt.current, 2.454101);
        assert_eq!(rt.voltage, Some(239.121));
    }

    #[test]
    fn passthrough_request_uses_expected_wire_keys() {
        let req = PassthroughRequest {
            method: "passthrough",
            params: PassthroughParams {
                device_id: "800GNU002",
                request_data: r#"{"system":{"get_sysinfo":null}}"#,
            },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["params"]["deviceId"], "800GNU002");
        // The inner command must stay a string, not become a nested object.
        assert!(v["params"]["requestData"].is_string());
    }
}
