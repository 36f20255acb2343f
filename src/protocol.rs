// Copyright 2026 GattLink Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wire protocol definitions and serialization.
//!
//! Line-delimited JSON-RPC 2.0: requests carry an `id` and receive a
//! matching response; server-originated notifications carry no `id`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::BridgeError;

/// JSON-RPC version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// A client request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Correlation id; echoed back in the response.
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A response to a client request. Exactly one of `result` and
/// `error` is present.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

/// JSON-RPC error member.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
}

impl Response {
    /// Build a success response echoing the request id.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response from a bridge error.
    pub fn failure(id: Option<Value>, error: &BridgeError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(ErrorObject {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }

    /// Serialize to a JSON line with newline delimiter.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Server-originated notifications.
pub struct Notification;

impl Notification {
    /// Serialize a notification to a JSON line with newline delimiter.
    pub fn line<T: Serialize>(method: &str, params: T) -> serde_json::Result<String> {
        let message = serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": method,
            "params": params,
        });
        Ok(format!("{}\n", serde_json::to_string(&message)?))
    }
}

/// A GATT identifier argument: a full 128-bit UUID string, or a
/// 16/32-bit shorthand given as a hex string or a JSON integer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UuidArg {
    Number(u32),
    Text(String),
}

/// One filter object of a `discover` request.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "namePrefix")]
    pub name_prefix: Option<String>,
    #[serde(default)]
    pub services: Vec<UuidArg>,
    /// Recognized but unsupported; its presence is an error.
    #[serde(default, rename = "manufacturerData")]
    pub manufacturer_data: Option<Value>,
    /// Recognized but unsupported; its presence is an error.
    #[serde(default, rename = "serviceData")]
    pub service_data: Option<Value>,
}

/// Parameters of `discover`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverParams {
    pub filters: Vec<FilterSpec>,
    #[serde(default, rename = "optionalServices")]
    pub optional_services: Vec<UuidArg>,
}

/// Parameters of `connect`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "peripheralId")]
    pub peripheral_id: u64,
}

/// Parameters of `read`.
///
/// `encoding` distinguishes "absent" (defaults to base64) from an
/// explicit `null` (return the value without re-encoding).
#[derive(Debug, Clone, Deserialize)]
pub struct ReadParams {
    #[serde(default, rename = "serviceId")]
    pub service_id: Option<UuidArg>,
    #[serde(default, rename = "characteristicId")]
    pub characteristic_id: Option<UuidArg>,
    #[serde(default, deserialize_with = "double_option")]
    pub encoding: Option<Option<String>>,
    #[serde(default, rename = "startNotifications")]
    pub start_notifications: bool,
}

/// Parameters of `write`.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteParams {
    #[serde(default, rename = "serviceId")]
    pub service_id: Option<UuidArg>,
    #[serde(default, rename = "characteristicId")]
    pub characteristic_id: Option<UuidArg>,
    pub message: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Parameters of `stopNotifications`.
#[derive(Debug, Clone, Deserialize)]
pub struct StopNotificationsParams {
    #[serde(default, rename = "serviceId")]
    pub service_id: Option<UuidArg>,
    #[serde(default, rename = "characteristicId")]
    pub characteristic_id: Option<UuidArg>,
}

/// Result of `read`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadResult {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// `didDiscoverPeripheral` notification payload.
#[derive(Debug, Clone, Serialize)]
pub struct DidDiscoverPeripheral {
    #[serde(rename = "peripheralId")]
    pub peripheral_id: u64,
    pub name: String,
    pub rssi: i16,
}

/// `characteristicDidChange` notification payload.
#[derive(Debug, Clone, Serialize)]
pub struct CharacteristicDidChange {
    #[serde(rename = "serviceId")]
    pub service_id: String,
    #[serde(rename = "characteristicId")]
    pub characteristic_id: String,
    pub message: String,
    pub encoding: &'static str,
}

/// Deserialize a field so a missing key and an explicit `null` stay
/// distinguishable.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parsing() {
        let req: Request = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":7,"method":"discover","params":{"filters":[{"name":"Hub"}]}}"#,
        )
        .unwrap();
        assert_eq!(req.method, "discover");
        assert_eq!(req.id, Some(json!(7)));

        let params: DiscoverParams = serde_json::from_value(req.params).unwrap();
        assert_eq!(params.filters.len(), 1);
        assert_eq!(params.filters[0].name.as_deref(), Some("Hub"));
        assert!(params.optional_services.is_empty());
    }

    #[test]
    fn test_read_encoding_absent_vs_null() {
        let absent: ReadParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.encoding, None);
        assert!(!absent.start_notifications);

        let null: ReadParams = serde_json::from_value(json!({ "encoding": null })).unwrap();
        assert_eq!(null.encoding, Some(None));

        let base64: ReadParams = serde_json::from_value(json!({ "encoding": "base64" })).unwrap();
        assert_eq!(base64.encoding, Some(Some("base64".to_string())));
    }

    #[test]
    fn test_uuid_arg_forms() {
        let params: DiscoverParams = serde_json::from_value(json!({
            "filters": [{ "services": [0x180f, "180f", "0000180f-0000-1000-8000-00805f9b34fb"] }]
        }))
        .unwrap();
        let services = &params.filters[0].services;
        assert!(matches!(services[0], UuidArg::Number(0x180f)));
        assert!(matches!(services[1], UuidArg::Text(_)));
        assert!(matches!(services[2], UuidArg::Text(_)));
    }

    #[test]
    fn test_response_serialization() {
        let ok = Response::success(Some(json!(1)), json!(null));
        let line = ok.to_json().unwrap();
        assert!(line.contains("\"result\":null"));
        assert!(!line.contains("error"));
        assert!(line.ends_with('\n'));

        let err = Response::failure(
            Some(json!(2)),
            &BridgeError::invalid_params("bad filter"),
        );
        let line = err.to_json().unwrap();
        assert!(line.contains("\"code\":-32602"));
        assert!(line.contains("bad filter"));
        assert!(!line.contains("result"));
    }

    #[test]
    fn test_notification_line() {
        let line = Notification::line(
            "didDiscoverPeripheral",
            DidDiscoverPeripheral {
                peripheral_id: 42,
                name: "Hub".into(),
                rssi: -60,
            },
        )
        .unwrap();
        assert!(line.contains("\"method\":\"didDiscoverPeripheral\""));
        assert!(line.contains("\"peripheralId\":42"));
        assert!(line.contains("\"rssi\":-60"));
        assert!(!line.contains("\"id\""));
    }
}
