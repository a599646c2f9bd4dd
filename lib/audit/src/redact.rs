//! Recursive key-based redaction (§4.4) applied to audit record payloads.
//!
//! The teacher's `credential.rs` encrypts credentials at rest but has no
//! reusable masking helper for logging; this is authored fresh, in the
//! teacher's style (plain functions over `serde_json::Value`, no new
//! abstraction beyond what the one call site needs).

use serde_json::{Map, Value};

/// Keys whose values are fully replaced with `"[REDACTED]"` wherever they
/// appear, at any depth, in `old_value`/`new_value`/`details`.
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "secret",
    "api_key",
    "access_key",
    "secret_key",
    "token",
    "private_key",
    "credentials",
];

/// Walks `value` recursively, replacing sensitive keys' values in place.
/// Idempotent: redacting an already-redacted value is a no-op.
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => redact_object(map),
        Value::Array(items) => {
            for item in items {
                redact(item);
            }
        }
        _ => {}
    }
}

fn redact_object(map: &mut Map<String, Value>) {
    for (key, val) in map.iter_mut() {
        if SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
            *val = Value::from("[REDACTED]");
        } else {
            redact(val);
        }
    }
}

/// Connection-config masking: every non-empty string value is replaced
/// with `"********"`, regardless of key name (§4.4). Used where an entire
/// config blob is opaque and none of it should reach a log line.
pub fn mask_connection_config(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for val in map.values_mut() {
                mask_connection_config(val);
            }
        }
        Value::Array(items) => {
            for item in items {
                mask_connection_config(item);
            }
        }
        Value::String(s) if !s.is_empty() => {
            *s = "********".to_string();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_keys_at_any_depth() {
        let mut value = json!({
            "username": "alice",
            "password": "hunter2",
            "nested": { "api_key": "sk-live-abc", "note": "fine" },
        });
        redact(&mut value);
        assert_eq!(value["username"], "alice");
        assert_eq!(value["password"], "[REDACTED]");
        assert_eq!(value["nested"]["api_key"], "[REDACTED]");
        assert_eq!(value["nested"]["note"], "fine");
    }

    #[test]
    fn redact_is_idempotent() {
        let mut value = json!({ "token": "abc" });
        redact(&mut value);
        redact(&mut value);
        assert_eq!(value["token"], "[REDACTED]");
    }

    #[test]
    fn redacts_inside_arrays() {
        let mut value = json!({ "credentials": [{"secret": "x"}] });
        redact(&mut value);
        assert_eq!(value["credentials"], "[REDACTED]");
    }

    #[test]
    fn mask_connection_config_masks_every_nonempty_string() {
        let mut value = json!({ "host": "db.internal", "password": "p", "port": 5432 });
        mask_connection_config(&mut value);
        assert_eq!(value["host"], "********");
        assert_eq!(value["password"], "********");
        assert_eq!(value["port"], 5432);
    }

    #[test]
    fn mask_connection_config_is_idempotent() {
        let mut value = json!({ "host": "db.internal" });
        mask_connection_config(&mut value);
        mask_connection_config(&mut value);
        assert_eq!(value["host"], "********");
    }
}
