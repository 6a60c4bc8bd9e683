//! Event tests

use serde_json::{json, Value};

use crate::Event;

#[test]
fn test_from_text() {
    let event = Event::from_text("a raw line");
    assert_eq!(event.text.as_deref(), Some("a raw line"));
    assert!(event.fields.is_empty());
    assert!(event.source.is_empty());
}

#[test]
fn test_field_str_ignores_non_strings() {
    let mut event = Event::default();
    event.fields.insert("type".into(), Value::String("access".into()));
    event.fields.insert("count".into(), json!(3));

    assert_eq!(event.field_str("type"), Some("access"));
    assert_eq!(event.field_str("count"), None);
    assert_eq!(event.field_str("missing"), None);
}

#[test]
fn test_text_or_json_prefers_text() {
    let mut event = Event::from_text("raw");
    event.fields.insert("k".into(), json!("v"));
    assert_eq!(event.text_or_json().as_deref(), Some("raw"));
}

#[test]
fn test_text_or_json_synthesizes_from_fields() {
    let mut event = Event::default();
    event.fields.insert("k".into(), json!("v"));

    let payload = event.text_or_json().expect("payload");
    let parsed: Value = serde_json::from_str(&payload).expect("valid json");
    assert_eq!(parsed, json!({"k": "v"}));
}

#[test]
fn test_text_or_json_empty_event_is_none() {
    assert!(Event::default().text_or_json().is_none());
}
