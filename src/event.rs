//! Dispatcher invocation events.
//!
//! Storage-change notifications name the packs to load; any other payload
//! (a scheduler tick, an empty object, nothing at all) asks for a full sweep
//! of the packs prefix.

use serde_json::Value;

/// What triggered a dispatch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Load exactly these pack keys.
    Triggered(Vec<String>),
    /// List and load every pack under the packs prefix.
    Sweep,
}

impl DispatchEvent {
    /// Classify a raw event payload.
    ///
    /// A top-level `Records` array makes the event triggered, even when no
    /// record carries a usable `s3.object.key`. Keys arrive form-encoded and
    /// are decoded here.
    pub fn from_value(event: &Value) -> Self {
        let Some(records) = event.get("Records").and_then(Value::as_array) else {
            return Self::Sweep;
        };
        let keys = records
            .iter()
            .filter_map(|record| record.pointer("/s3/object/key").and_then(Value::as_str))
            .map(decode_object_key)
            .collect();
        Self::Triggered(keys)
    }

    /// Short label for logs.
    pub fn mode(&self) -> DispatchMode {
        match self {
            Self::Triggered(_) => DispatchMode::Triggered,
            Self::Sweep => DispatchMode::Sweep,
        }
    }
}

/// Dispatch mode, without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Storage-change notifications.
    Triggered,
    /// Scheduled prefix sweep.
    Sweep,
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Triggered => "triggered",
            Self::Sweep => "sweep",
        })
    }
}

/// Decode a notification key: `+` is a space, then percent escapes.
///
/// Keys that do not decode to UTF-8 are used verbatim.
pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn storage_records_are_triggered() {
        let event = json!({"Records": [
            {"s3": {"object": {"key": "packs/a.json"}}},
            {"s3": {"object": {"key": "packs/b.json"}}}
        ]});
        assert_eq!(
            DispatchEvent::from_value(&event),
            DispatchEvent::Triggered(vec!["packs/a.json".into(), "packs/b.json".into()])
        );
    }

    #[test]
    fn anything_else_is_a_sweep() {
        assert_eq!(DispatchEvent::from_value(&json!({})), DispatchEvent::Sweep);
        assert_eq!(DispatchEvent::from_value(&Value::Null), DispatchEvent::Sweep);
        assert_eq!(
            DispatchEvent::from_value(&json!({"source": "aws.events", "detail-type": "Scheduled Event"})),
            DispatchEvent::Sweep
        );
        assert_eq!(
            DispatchEvent::from_value(&json!({"Records": "nope"})),
            DispatchEvent::Sweep
        );
    }

    #[test]
    fn records_without_keys_dispatch_nothing() {
        let event = json!({"Records": [{"eventName": "ObjectCreated:Put"}]});
        assert_eq!(
            DispatchEvent::from_value(&event),
            DispatchEvent::Triggered(vec![])
        );
    }

    #[test]
    fn keys_are_form_decoded() {
        assert_eq!(decode_object_key("packs/my+pack%282%29.json"), "packs/my pack(2).json");
        assert_eq!(decode_object_key("packs/plain.json"), "packs/plain.json");
    }

    #[test]
    fn undecodable_key_used_verbatim() {
        assert_eq!(decode_object_key("packs/%FF.json"), "packs/%FF.json");
    }

    #[test]
    fn mode_labels() {
        assert_eq!(DispatchEvent::Sweep.mode().to_string(), "sweep");
        assert_eq!(
            DispatchEvent::Triggered(vec![]).mode().to_string(),
            "triggered"
        );
    }
}
