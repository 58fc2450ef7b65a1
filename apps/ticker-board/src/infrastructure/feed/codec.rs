//! Feed Codec
//!
//! JSON decoding for the symbol map lane and encoding for link requests.
//!
//! A text frame carries one record or an array of records. Three record
//! shapes are understood:
//!
//! ```json
//! {"event":"update","key":"DIS","value":{"price":109.5,"volume":"","movement":0.073}}
//! {"event":"remove","key":"DIS"}
//! {"@update":{"key":"DIS"},"timestamp":1709080398,"price":109.5}
//! ```
//!
//! plus the control records `{"event":"linked"}`, `{"event":"synced"}` and
//! `{"event":"unlinked"}`. Field values may be numbers or numeric strings;
//! anything else leaves that field out of the update without rejecting the
//! record.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::application::ports::{FeedError, FeedEvent};
use crate::domain::row::{Field, FieldUpdate, RowKey};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

impl From<CodecError> for FeedError {
    fn from(err: CodecError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Link state notifications from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// The lane link was accepted.
    Linked,
    /// The initial state has been fully delivered.
    Synced,
    /// The server dropped the link.
    Unlinked,
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A row change to forward to the board.
    Event(FeedEvent),
    /// A link state notification.
    Control(Control),
    /// A record that carries nothing usable.
    Skipped(&'static str),
}

/// Link or unlink a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkAction {
    /// Start receiving the lane.
    Link,
    /// Stop receiving the lane.
    Unlink,
}

#[derive(Serialize)]
struct LinkRequest<'a> {
    action: LinkAction,
    node: &'a str,
    lane: &'a str,
}

/// JSON codec for the symbol feed.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into records.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not JSON, or is JSON but neither an
    /// object nor an array. Individual malformed records inside a valid
    /// frame become [`FeedMessage::Skipped`].
    pub fn decode(&self, text: &str) -> Result<Vec<FeedMessage>, CodecError> {
        let value: Value = serde_json::from_str(text.trim())?;

        match value {
            Value::Array(items) => Ok(items.iter().map(decode_record).collect()),
            Value::Object(_) => Ok(vec![decode_record(&value)]),
            other => Err(CodecError::InvalidFormat(format!(
                "expected JSON array or object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Encode a link or unlink request.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode_link(
        &self,
        action: LinkAction,
        node: &str,
        lane: &str,
    ) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&LinkRequest { action, node, lane })?)
    }
}

fn decode_record(value: &Value) -> FeedMessage {
    let Some(obj) = value.as_object() else {
        return FeedMessage::Skipped("record is not an object");
    };

    if let Some(event) = obj.get("event").and_then(Value::as_str) {
        return decode_map_event(event, obj);
    }

    if let Some(tag) = obj.get("@update") {
        let Some(key) = tag.get("key").and_then(record_key) else {
            return FeedMessage::Skipped("missing key");
        };
        return FeedMessage::Event(FeedEvent::Upsert {
            key,
            update: field_update(obj),
        });
    }

    FeedMessage::Skipped("untagged record")
}

fn decode_map_event(event: &str, obj: &Map<String, Value>) -> FeedMessage {
    match event {
        "linked" => return FeedMessage::Control(Control::Linked),
        "synced" => return FeedMessage::Control(Control::Synced),
        "unlinked" => return FeedMessage::Control(Control::Unlinked),
        "update" | "remove" => {}
        _ => return FeedMessage::Skipped("unknown event"),
    }

    let Some(key) = obj.get("key").and_then(record_key) else {
        return FeedMessage::Skipped("missing key");
    };

    if event == "remove" {
        return FeedMessage::Event(FeedEvent::Remove { key });
    }

    let update = obj
        .get("value")
        .and_then(Value::as_object)
        .map(field_update)
        .unwrap_or_default();
    FeedMessage::Event(FeedEvent::Upsert { key, update })
}

fn record_key(value: &Value) -> Option<RowKey> {
    let key = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!key.is_empty()).then(|| RowKey::from(key))
}

fn field_update(obj: &Map<String, Value>) -> FieldUpdate {
    let mut update = FieldUpdate::new();

    for (name, raw) in obj {
        if name == "timestamp" {
            if let Some(ts) = coerce(raw) {
                #[allow(clippy::cast_possible_truncation)]
                update.set_timestamp(ts as i64);
            }
            continue;
        }

        // The upstream pricing feed names cumulative volume `day_volume`.
        let field = if name == "day_volume" {
            Some(Field::Volume)
        } else {
            Field::from_name(name)
        };

        if let Some(field) = field {
            update = update.with_opt(field, coerce(raw));
        }
    }

    update
}

fn coerce(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn single(text: &str) -> FeedMessage {
        let mut messages = JsonCodec::new().decode(text).unwrap();
        assert_eq!(messages.len(), 1);
        messages.remove(0)
    }

    fn upsert(message: FeedMessage) -> (RowKey, FieldUpdate) {
        match message {
            FeedMessage::Event(FeedEvent::Upsert { key, update }) => (key, update),
            other => panic!("expected upsert, got {other:?}"),
        }
    }

    #[test]
    fn decodes_map_update_with_partial_fields() {
        let (key, update) = upsert(single(
            r#"{"event":"update","key":"DIS","value":{"timestamp":1709080398,"price":109.5,"volume":"","bid":null,"movement":"0.073"}}"#,
        ));

        assert_eq!(key.as_str(), "DIS");
        assert_eq!(update.get(Field::Price), Some(109.5));
        assert_eq!(update.get(Field::Movement), Some(0.073));
        assert_eq!(update.get(Field::Volume), None);
        assert_eq!(update.get(Field::Bid), None);
        assert_eq!(update.timestamp(), Some(1_709_080_398));
    }

    #[test]
    fn decodes_map_remove() {
        assert_eq!(
            single(r#"{"event":"remove","key":"AAPL"}"#),
            FeedMessage::Event(FeedEvent::remove("AAPL"))
        );
    }

    #[test]
    fn decodes_tagged_value_update() {
        let (key, update) =
            upsert(single(r#"{"@update":{"key":"DIS"},"price":109.5,"day_volume":1200}"#));

        assert_eq!(key.as_str(), "DIS");
        assert_eq!(update.get(Field::Price), Some(109.5));
        assert_eq!(update.get(Field::Volume), Some(1_200.0));
    }

    #[test]
    fn zero_is_kept() {
        let (_, update) = upsert(single(
            r#"{"event":"update","key":"X","value":{"price":0,"movement":"0"}}"#,
        ));
        assert_eq!(update.get(Field::Price), Some(0.0));
        assert_eq!(update.get(Field::Movement), Some(0.0));
    }

    #[test]
    fn decodes_arrays_and_controls() {
        let messages = JsonCodec::new()
            .decode(r#"[{"event":"linked"},{"event":"synced"},{"event":"remove","key":"A"},{"event":"unlinked"}]"#)
            .unwrap();

        assert_eq!(
            messages,
            vec![
                FeedMessage::Control(Control::Linked),
                FeedMessage::Control(Control::Synced),
                FeedMessage::Event(FeedEvent::remove("A")),
                FeedMessage::Control(Control::Unlinked),
            ]
        );
    }

    #[test]
    fn records_without_key_are_skipped() {
        assert_eq!(
            single(r#"{"event":"update","key":"","value":{"price":1}}"#),
            FeedMessage::Skipped("missing key")
        );
        assert_eq!(
            single(r#"{"@update":{},"price":1}"#),
            FeedMessage::Skipped("missing key")
        );
        assert_eq!(
            single(r#"{"@remove":{"key":"DIS"}}"#),
            FeedMessage::Skipped("untagged record")
        );
        assert_eq!(single("[1]"), FeedMessage::Skipped("record is not an object"));
    }

    #[test]
    fn rejects_non_json_and_scalars() {
        let codec = JsonCodec::new();
        assert!(matches!(codec.decode("not json"), Err(CodecError::Json(_))));
        assert!(matches!(codec.decode("42"), Err(CodecError::InvalidFormat(_))));
        assert!(matches!(
            FeedError::from(CodecError::InvalidFormat("x".into())),
            FeedError::Decode(_)
        ));
    }

    #[test]
    fn encodes_link_requests() {
        let codec = JsonCodec::new();
        assert_eq!(
            codec.encode_link(LinkAction::Link, "/symbols", "stocks").unwrap(),
            r#"{"action":"link","node":"/symbols","lane":"stocks"}"#
        );
        assert_eq!(
            codec.encode_link(LinkAction::Unlink, "/symbols", "stocks").unwrap(),
            r#"{"action":"unlink","node":"/symbols","lane":"stocks"}"#
        );
    }
}
