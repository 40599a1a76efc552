//! Unit tests for control frame classification.

use super::*;

#[test]
fn resize_frame_parses() {
    let msg = ControlMessage::parse(br#"{"type":"resize","cols":120,"rows":40}"#).unwrap();
    assert_eq!(msg, Some(ControlMessage::Resize { cols: 120, rows: 40 }));
}

#[test]
fn auth_frame_parses() {
    let msg = ControlMessage::parse(br#"{"type":"auth","token":"abc123"}"#).unwrap();
    assert_eq!(
        msg,
        Some(ControlMessage::Auth {
            token: "abc123".to_string()
        })
    );
}

#[test]
fn plain_keystrokes_are_data() {
    assert_eq!(ControlMessage::parse(b"ls -la\n").unwrap(), None);
    assert_eq!(ControlMessage::parse(b"").unwrap(), None);
    assert_eq!(ControlMessage::parse(b"\x1b[A").unwrap(), None);
}

#[test]
fn json_without_type_tag_is_data() {
    // Someone pasting JSON into their shell must not have it swallowed.
    assert_eq!(ControlMessage::parse(br#"{"cols":120,"rows":40}"#).unwrap(), None);
    assert_eq!(ControlMessage::parse(br#"{"hello":"world"}"#).unwrap(), None);
}

#[test]
fn braces_that_are_not_json_are_data() {
    assert_eq!(ControlMessage::parse(b"{ not json").unwrap(), None);
    assert_eq!(ControlMessage::parse(b"{{}}").unwrap(), None);
}

#[test]
fn malformed_control_is_an_error_not_a_drop() {
    // Announces a known type but the payload is wrong.
    let err = ControlMessage::parse(br#"{"type":"resize","cols":"wide"}"#).unwrap_err();
    assert!(err.reason.contains("resize"));

    // Unknown control type.
    let err = ControlMessage::parse(br#"{"type":"detach"}"#).unwrap_err();
    assert!(err.reason.contains("detach"));
}

#[test]
fn leading_whitespace_is_tolerated() {
    let msg = ControlMessage::parse(b"  {\"type\":\"resize\",\"cols\":81,\"rows\":25}").unwrap();
    assert_eq!(msg, Some(ControlMessage::Resize { cols: 81, rows: 25 }));
}
