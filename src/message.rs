//! The wire and in-queue record (§3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// A single message passed over the bus.
///
/// Enrichment fields (`timestamp`, `hostname`, and the appended `route`
/// token) are set once by [`crate::messenger::Messenger::send`], before the
/// message is serialized onto its channel's queue. A `Message` is otherwise
/// immutable once enqueued.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(rename = "Uuid", default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(rename = "Timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(rename = "ChannelName", default, skip_serializing_if = "is_default")]
    pub channel_name: String,

    #[serde(rename = "ServiceName", default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    #[serde(rename = "ServiceType", default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    #[serde(rename = "Hostname", default, skip_serializing_if = "is_default")]
    pub hostname: String,

    #[serde(rename = "Text", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(rename = "Summary", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(rename = "State", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(rename = "MetricName", default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,

    #[serde(rename = "Metric", default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<f64>,

    #[serde(rename = "Data", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(rename = "Route", default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<String>,
}

impl Message {
    /// The `"<hostname>:<channel>"` token used to break routing loops (§4.2).
    pub fn route_token(hostname: &str, channel: &str) -> String {
        format!("{hostname}:{channel}")
    }

    pub fn has_visited(&self, token: &str) -> bool {
        self.route.iter().any(|hop| hop == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let msg = Message {
            channel_name: "telemetry".into(),
            text: Some("hello".into()),
            metric: Some(1.5),
            route: vec!["host-a:telemetry".into()],
            ..Default::default()
        };
        let encoded = serde_json::to_string(&msg).expect("encode");
        assert!(!encoded.contains('\n'));
        let decoded: Message = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let msg = Message {
            channel_name: "c".into(),
            ..Default::default()
        };
        let encoded = serde_json::to_value(&msg).expect("encode");
        let obj = encoded.as_object().expect("object");
        assert!(!obj.contains_key("Text"));
        assert!(!obj.contains_key("Uuid"));
        assert!(!obj.contains_key("Route"));
    }

    #[test]
    fn route_token_matches_spec_format() {
        assert_eq!(Message::route_token("box1", "alerts"), "box1:alerts");
    }
}
