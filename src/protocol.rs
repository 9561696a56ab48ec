use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Outbound request envelope
///
/// The controller correlates traffic with an optional `transactionId`; the
/// constructors always generate one, but none of the recognized replies are
/// synchronous, so the id is only useful for log correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(
        rename = "transactionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_id: Option<Uuid>,
    #[serde(flatten)]
    pub body: RequestBody,
}

/// Request payloads, discriminated by the wire `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestBody {
    /// Ask the controller to announce every device it manages
    #[serde(rename = "DEVICE_LIST_REQUEST")]
    DeviceList { source: String },

    /// Change power and optionally brightness of one device
    #[serde(rename = "CONTROL")]
    Control {
        uuid: String,
        power: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dim: Option<u8>,
        source: String,
    },
}

impl Request {
    /// Build a device-list request
    pub fn device_list(source: impl Into<String>) -> Self {
        Self {
            transaction_id: Some(Uuid::new_v4()),
            body: RequestBody::DeviceList {
                source: source.into(),
            },
        }
    }

    /// Build a targeted state-change request
    pub fn control(
        uuid: impl Into<String>,
        power: bool,
        dim: Option<u8>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: Some(Uuid::new_v4()),
            body: RequestBody::Control {
                uuid: uuid.into(),
                power,
                dim,
                source: source.into(),
            },
        }
    }
}

/// Inbound push messages, discriminated by the wire `type` field
///
/// Anything the controller sends with an unrecognized `type` decodes to
/// [`Push::Other`] and is ignored rather than treated as an error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Push {
    /// A device announcement, sent zero or more times after a device-list
    /// request (and whenever the controller feels like re-announcing)
    #[serde(rename = "DEVICE_FOUND")]
    DeviceFound { data: FoundDevice },

    /// Confirmation of a state change applied by the controller
    #[serde(rename = "EVENT")]
    StateChanged { data: StateChange },

    #[serde(other)]
    Other,
}

/// Payload of a `DEVICE_FOUND` announcement
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FoundDevice {
    pub name: String,
    pub uuid: String,
    #[serde(default)]
    pub state: StateFields,
    #[serde(default, deserialize_with = "capability_list")]
    pub capabilities: Vec<String>,
}

/// Payload of an `EVENT` state-change confirmation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateChange {
    /// UUID of the device the change was applied to
    pub target: String,
    #[serde(default)]
    pub state: StateFields,
}

/// State fields as they appear on the wire; each one is optional so a message
/// can carry a partial update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct StateFields {
    #[serde(default)]
    pub power: Option<bool>,
    #[serde(default)]
    pub dim: Option<u8>,
}

/// Controllers report capabilities as a `+`-joined string (`"power+dim"`);
/// accept that or a plain JSON array and normalize to a list.
fn capability_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Wire::deserialize(deserializer)? {
        Wire::Joined(joined) => joined
            .split('+')
            .filter(|part| !part.is_empty())
            .map(str::to_owned)
            .collect(),
        Wire::List(list) => list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_request_round_trips() {
        let request = Request::control("d1", true, Some(70), "test-client");
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: Request = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn control_request_wire_shape() {
        let request = Request::control("d1", true, Some(70), "test-client");
        let value: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "CONTROL");
        assert_eq!(value["uuid"], "d1");
        assert_eq!(value["power"], true);
        assert_eq!(value["dim"], 70);
        assert_eq!(value["source"], "test-client");
        assert!(value["transactionId"].is_string());
    }

    #[test]
    fn control_without_dim_omits_the_field() {
        let request = Request::control("d1", false, None, "test-client");
        let value: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert!(value.get("dim").is_none());
    }

    #[test]
    fn device_list_request_wire_shape() {
        let request = Request::device_list("test-client");
        let value: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "DEVICE_LIST_REQUEST");
        assert_eq!(value["source"], "test-client");
    }

    #[test]
    fn parses_device_found() {
        let raw = json!({
            "type": "DEVICE_FOUND",
            "data": {
                "name": "Coffee bar",
                "uuid": "8f0-1",
                "state": { "power": true, "dim": 55 },
                "capabilities": "power+dim"
            }
        });
        let push: Push = serde_json::from_value(raw).unwrap();
        let data = match push {
            Push::DeviceFound { data } => data,
            other => panic!("expected DEVICE_FOUND, got {other:?}"),
        };
        assert_eq!(data.name, "Coffee bar");
        assert_eq!(data.uuid, "8f0-1");
        assert_eq!(data.state.power, Some(true));
        assert_eq!(data.state.dim, Some(55));
        assert_eq!(data.capabilities, vec!["power", "dim"]);
    }

    #[test]
    fn parses_capability_array_form() {
        let raw = json!({
            "type": "DEVICE_FOUND",
            "data": {
                "name": "Porch",
                "uuid": "8f0-2",
                "capabilities": ["power"]
            }
        });
        let push: Push = serde_json::from_value(raw).unwrap();
        let data = match push {
            Push::DeviceFound { data } => data,
            other => panic!("expected DEVICE_FOUND, got {other:?}"),
        };
        assert_eq!(data.capabilities, vec!["power"]);
        assert_eq!(data.state, StateFields::default());
    }

    #[test]
    fn parses_state_change_event() {
        let raw = json!({
            "type": "EVENT",
            "data": {
                "target": "8f0-1",
                "state": { "power": false }
            }
        });
        let push: Push = serde_json::from_value(raw).unwrap();
        let data = match push {
            Push::StateChanged { data } => data,
            other => panic!("expected EVENT, got {other:?}"),
        };
        assert_eq!(data.target, "8f0-1");
        assert_eq!(data.state.power, Some(false));
        assert_eq!(data.state.dim, None);
    }

    #[test]
    fn unrecognized_type_is_ignored_not_an_error() {
        let raw = json!({ "type": "DEVICE_PING", "data": {} });
        let push: Push = serde_json::from_value(raw).unwrap();
        assert_eq!(push, Push::Other);
    }
}
