use geotrail::host::contract::{
    CommandEnvelope, CommandName, ContractErrorKind, EVENT_VERSION, EventEnvelope, ResponseEnvelope,
};

#[test]
fn every_command_name_matches_its_serde_form() {
    for name in CommandName::ALL {
        let wire = name.as_str();
        assert_eq!(CommandName::parse(wire), Some(name));

        let json = serde_json::to_value(name).expect("serialize command name");
        assert_eq!(json, wire);
        let back: CommandName = serde_json::from_value(json).expect("deserialize command name");
        assert_eq!(back, name);
    }
    assert!(CommandName::parse("collection.pause").is_none());
}

#[test]
fn command_envelope_json_shape() {
    let envelope = CommandEnvelope::new(
        "req-123",
        CommandName::CollectionStart,
        serde_json::json!({"interval_ms": 10000}),
    );

    let json = serde_json::to_value(&envelope).expect("serialize command envelope");
    assert_eq!(json["v"], EVENT_VERSION);
    assert_eq!(json["request_id"], "req-123");
    assert_eq!(json["command"], "collection.start");
    assert_eq!(json["payload"]["interval_ms"], 10000);
}

#[test]
fn command_envelope_parses_from_host_line() {
    let line = r#"{"v":1,"request_id":"r9","command":"location.report","payload":{"latitude":1,"longitude":2,"precision":3}}"#;
    let envelope: CommandEnvelope = serde_json::from_str(line).expect("parse host line");
    assert_eq!(envelope.command, CommandName::LocationReport);
    assert!(envelope.validate().is_ok());
}

#[test]
fn event_envelope_json_shape() {
    let envelope = EventEnvelope::new(
        "evt-777",
        "samples.appended",
        serde_json::json!({"id": 4}),
    );

    let json = serde_json::to_value(&envelope).expect("serialize event envelope");
    assert_eq!(json["v"], EVENT_VERSION);
    assert_eq!(json["event_id"], "evt-777");
    assert_eq!(json["event"], "samples.appended");
    assert_eq!(json["payload"]["id"], 4);
}

#[test]
fn command_envelope_rejects_wrong_version() {
    let mut envelope =
        CommandEnvelope::new("req-1", CommandName::CollectionStatus, serde_json::json!({}));
    envelope.v = EVENT_VERSION + 1;

    let err = envelope.validate().expect_err("version should be rejected");
    assert_eq!(err.kind, ContractErrorKind::UnsupportedVersion);
}

#[test]
fn command_envelope_rejects_blank_request_id() {
    let envelope = CommandEnvelope::new("  ", CommandName::HostPing, serde_json::json!({}));
    let err = envelope.validate().expect_err("blank id should be rejected");
    assert_eq!(err.kind, ContractErrorKind::InvalidEnvelope);
}

#[test]
fn response_envelope_json_shape() {
    let ok = ResponseEnvelope::ok("req-1", serde_json::json!({"running": true}));
    let ok_json = serde_json::to_value(&ok).expect("serialize ok response envelope");
    assert_eq!(ok_json["ok"], true);
    assert_eq!(ok_json["payload"]["running"], true);
    assert!(ok_json["error"].is_null());

    let err = ResponseEnvelope::error("req-2", "bad payload");
    let err_json = serde_json::to_value(&err).expect("serialize error response envelope");
    assert_eq!(err_json["ok"], false);
    assert_eq!(err_json["payload"], serde_json::Value::Null);
    assert_eq!(err_json["error"], "bad payload");
}
