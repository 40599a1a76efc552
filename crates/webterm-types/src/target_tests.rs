//! Unit tests for target validation and PTY size clamping.

use super::*;

#[test]
fn pty_size_clamps_degenerate_requests() {
    let mut target = ConnectionTarget::new("10.0.0.5", 22, "ops");
    assert_eq!(target.pty_size(), (80, 24));

    target.width = 1;
    target.height = 1;
    assert_eq!(target.pty_size(), (80, 24));

    target.width = 120;
    target.height = 40;
    assert_eq!(target.pty_size(), (120, 40));

    // One sane axis does not excuse the other.
    target.width = 200;
    target.height = 0;
    assert_eq!(target.pty_size(), (200, 24));
}

#[test]
fn validate_rejects_empty_fields() {
    let good = ConnectionTarget::new("10.0.0.5", 22, "ops");
    assert!(good.validate().is_ok());

    let mut bad = good.clone();
    bad.host = "  ".into();
    assert_eq!(bad.validate(), Err("host"));

    let mut bad = good.clone();
    bad.port = 0;
    assert_eq!(bad.validate(), Err("port"));

    let mut bad = good.clone();
    bad.username = String::new();
    assert_eq!(bad.validate(), Err("username"));
}

#[test]
fn deserializes_with_defaults() {
    let target: ConnectionTarget = toml_like_json(r#"{"host":"h1","username":"root"}"#);
    assert_eq!(target.port, 22);
    assert_eq!(target.term, "xterm-256color");
    assert_eq!(target.pty_size(), (80, 24));
}

fn toml_like_json(raw: &str) -> ConnectionTarget {
    serde_json::from_str(raw).expect("valid target json")
}
