//! Device model and cached snapshot values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Known litter box hardware generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LitterBoxModel {
    T3,
    T4,
    T5,
}

/// What kind of hardware a device is.
///
/// Remote type strings that don't match a known kind are kept verbatim in
/// [`DeviceKind::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceKind {
    LitterBox { model: LitterBoxModel },
    Feeder,
    Fountain,
    Unknown { raw: String },
}

impl DeviceKind {
    /// Classify a remote device type string. Matching is case-insensitive.
    pub fn from_type(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "t3" => DeviceKind::LitterBox {
                model: LitterBoxModel::T3,
            },
            "t4" => DeviceKind::LitterBox {
                model: LitterBoxModel::T4,
            },
            "t5" => DeviceKind::LitterBox {
                model: LitterBoxModel::T5,
            },
            "feeder" | "feedermini" | "d3" | "d4" | "d4s" | "d4h" => DeviceKind::Feeder,
            "fountain" | "w5" | "ctw3" => DeviceKind::Fountain,
            _ => DeviceKind::Unknown {
                raw: raw.to_string(),
            },
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, DeviceKind::Unknown { .. })
    }
}

/// One device reported by a remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,

    /// Scalar status fields as reported by the remote (battery, weight, ...).
    #[serde(default)]
    pub state: Map<String, Value>,
}

const ID_FIELDS: &[&str] = &["id", "deviceId", "device_id"];
const NAME_FIELDS: &[&str] = &["name", "deviceName", "device_name"];
const TYPE_FIELDS: &[&str] = &["type", "deviceType", "device_type"];

impl Device {
    /// Build a device from one element of a remote device list.
    ///
    /// Only scalar fields are kept in `state`, from the top level and from a
    /// nested `state` object if there is one.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("device entry is not an object: {}", value))?;

        let id = first_field(object, ID_FIELDS)
            .and_then(scalar_to_string)
            .ok_or_else(|| "device entry has no id".to_string())?;

        let name = first_field(object, NAME_FIELDS)
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();

        let raw_type = first_field(object, TYPE_FIELDS)
            .or_else(|| value.pointer("/deviceNfo/deviceType"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let skip: Vec<&str> = ID_FIELDS
            .iter()
            .chain(NAME_FIELDS)
            .chain(TYPE_FIELDS)
            .copied()
            .collect();

        let mut state: Map<String, Value> = object
            .iter()
            .filter(|(key, v)| !skip.contains(&key.as_str()) && is_scalar(v))
            .map(|(key, v)| (key.clone(), v.clone()))
            .collect();

        if let Some(nested) = object.get("state").and_then(Value::as_object) {
            for (key, v) in nested.iter().filter(|(_, v)| is_scalar(v)) {
                state.entry(key.clone()).or_insert_with(|| v.clone());
            }
        }

        Ok(Self {
            id,
            name,
            kind: DeviceKind::from_type(raw_type),
            state,
        })
    }
}

fn first_field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

/// Where device lists live in the payloads we know about.
const DEVICE_LIST_POINTERS: &[&str] = &["/devices", "/result/list", "/result", "/data"];

/// Extract the device list from a remote response.
///
/// Entries that can't be parsed are skipped with a warning; a response with
/// no recognizable list is an error.
pub fn parse_devices(body: &Value) -> Result<Vec<Device>, String> {
    let list = body
        .as_array()
        .or_else(|| {
            DEVICE_LIST_POINTERS
                .iter()
                .find_map(|pointer| body.pointer(pointer).and_then(Value::as_array))
        })
        .ok_or_else(|| "response contains no device list".to_string())?;

    let devices = list
        .iter()
        .filter_map(|entry| match Device::from_json(entry) {
            Ok(device) => Some(device),
            Err(e) => {
                warn!(error = %e, "Skipping unparseable device entry");
                None
            }
        })
        .collect();

    Ok(devices)
}

/// A value stored in the dashboard cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Snapshot {
    Devices(Vec<Device>),
    Json(Value),
    Timestamp(DateTime<Utc>),
}

impl Snapshot {
    pub fn as_devices(&self) -> Option<&[Device]> {
        match self {
            Snapshot::Devices(devices) => Some(devices),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Snapshot::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Snapshot::Timestamp(at) => Some(*at),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_kind_from_type() {
        assert_eq!(
            DeviceKind::from_type("t4"),
            DeviceKind::LitterBox {
                model: LitterBoxModel::T4
            }
        );
        assert_eq!(
            DeviceKind::from_type(" T5 "),
            DeviceKind::LitterBox {
                model: LitterBoxModel::T5
            }
        );
        assert_eq!(DeviceKind::from_type("D4s"), DeviceKind::Feeder);
        assert_eq!(DeviceKind::from_type("w5"), DeviceKind::Fountain);
        assert_eq!(
            DeviceKind::from_type("k2"),
            DeviceKind::Unknown { raw: "k2".into() }
        );
        assert!(!DeviceKind::from_type("k2").is_known());
    }

    #[test]
    fn test_device_from_json() {
        let device = Device::from_json(&json!({
            "id": 10042,
            "name": "Upstairs box",
            "deviceType": "T4",
            "battery": 80,
            "sand_percent": 55,
            "records": [1, 2, 3],
            "state": { "box_full": false, "battery": 1 }
        }))
        .unwrap();

        assert_eq!(device.id, "10042");
        assert_eq!(device.name, "Upstairs box");
        assert_eq!(
            device.kind,
            DeviceKind::LitterBox {
                model: LitterBoxModel::T4
            }
        );
        assert_eq!(device.state["battery"], 80);
        assert_eq!(device.state["box_full"], false);
        assert!(!device.state.contains_key("records"));
        assert!(!device.state.contains_key("deviceType"));
    }

    #[test]
    fn test_device_type_from_nested_info() {
        let device = Device::from_json(&json!({
            "id": "abc",
            "deviceNfo": { "deviceType": "t3" }
        }))
        .unwrap();

        assert_eq!(device.name, "Unknown");
        assert_eq!(
            device.kind,
            DeviceKind::LitterBox {
                model: LitterBoxModel::T3
            }
        );
    }

    #[test]
    fn test_device_without_id_is_rejected() {
        assert!(Device::from_json(&json!({"name": "ghost"})).is_err());
        assert!(Device::from_json(&json!("not an object")).is_err());
    }

    #[test]
    fn test_parse_devices_finds_nested_list() {
        let body = json!({
            "result": {
                "list": [
                    {"id": 1, "type": "t4"},
                    {"name": "no id"},
                    {"id": 2, "type": "d4"}
                ]
            }
        });

        let devices = parse_devices(&body).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].kind, DeviceKind::Feeder);
    }

    #[test]
    fn test_parse_devices_top_level_array() {
        let devices = parse_devices(&json!([{"id": "x", "type": "w5"}])).unwrap();
        assert_eq!(devices[0].kind, DeviceKind::Fountain);
    }

    #[test]
    fn test_parse_devices_without_list() {
        assert!(parse_devices(&json!({"result": {"count": 0}})).is_err());
    }

    #[test]
    fn test_snapshot_accessors() {
        let now = Utc::now();
        assert_eq!(Snapshot::Timestamp(now).as_timestamp(), Some(now));
        assert!(Snapshot::Json(json!({})).as_devices().is_none());
        assert_eq!(Snapshot::Devices(vec![]).as_devices().map(<[_]>::len), Some(0));
    }
}
