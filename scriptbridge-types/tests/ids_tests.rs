use scriptbridge_types::{CallId, EndpointId};
use std::collections::HashSet;
use std::str::FromStr;

// ── CallId ────────────────────────────────────────────────────────

#[test]
fn call_id_new_is_unique() {
    let ids: HashSet<CallId> = (0..1000).map(|_| CallId::new()).collect();
    assert_eq!(ids.len(), 1000);
}

#[test]
fn call_id_display_and_parse() {
    let id = CallId::new();
    let parsed = CallId::from_str(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn call_id_parse_invalid() {
    assert!(CallId::from_str("not-a-uuid").is_err());
}

#[test]
fn call_id_serializes_as_string() {
    let id = CallId::new();
    let json = serde_json::to_value(id).unwrap();
    assert_eq!(json, serde_json::Value::String(id.to_string()));
}

// ── EndpointId ────────────────────────────────────────────────────

#[test]
fn endpoint_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = EndpointId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn endpoint_id_default_is_unique() {
    assert_ne!(EndpointId::default(), EndpointId::default());
}
