use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::mpsc;

use super::*;
use crate::auth::StaticTokenValidator;

struct QueueSource {
    rx: mpsc::UnboundedReceiver<RelayResult<ClientFrame>>,
}

#[async_trait]
impl ClientSource for QueueSource {
    async fn recv(&mut self) -> Option<RelayResult<ClientFrame>> {
        self.rx.recv().await
    }
}

fn source_with(frames: Vec<ClientFrame>) -> QueueSource {
    let (tx, rx) = mpsc::unbounded_channel();
    for frame in frames {
        tx.send(Ok(frame)).unwrap();
    }
    QueueSource { rx }
}

fn validator() -> StaticTokenValidator {
    StaticTokenValidator::new(vec![SecretString::from("open-sesame")])
}

#[tokio::test]
async fn handshake_accepts_a_valid_auth_frame() {
    let mut source = source_with(vec![ClientFrame::Text(
        r#"{"type":"auth","token":"open-sesame"}"#.to_string(),
    )]);
    assert!(await_handshake(&mut source, &validator()).await.is_ok());
}

#[tokio::test]
async fn handshake_rejects_a_bad_token() {
    let mut source = source_with(vec![ClientFrame::Text(
        r#"{"type":"auth","token":"wrong"}"#.to_string(),
    )]);
    let err = await_handshake(&mut source, &validator()).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn handshake_rejects_keystrokes_before_auth() {
    let mut source = source_with(vec![ClientFrame::Text("ls\n".to_string())]);
    let err = await_handshake(&mut source, &validator()).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn handshake_rejects_a_resize_frame() {
    // Resize is a control frame but not an auth frame; order matters.
    let mut source = source_with(vec![ClientFrame::Text(
        r#"{"type":"resize","cols":80,"rows":24}"#.to_string(),
    )]);
    assert!(await_handshake(&mut source, &validator()).await.is_err());
}

#[tokio::test]
async fn handshake_rejects_an_early_disconnect() {
    let mut source = source_with(vec![ClientFrame::Close]);
    assert!(await_handshake(&mut source, &validator()).await.is_err());

    let (_tx, rx) = mpsc::unbounded_channel::<RelayResult<ClientFrame>>();
    drop(_tx);
    let mut gone = QueueSource { rx };
    assert!(await_handshake(&mut gone, &validator()).await.is_err());
}

#[tokio::test]
async fn handshake_accepts_binary_auth_frames() {
    let mut source = source_with(vec![ClientFrame::Binary(
        br#"{"type":"auth","token":"open-sesame"}"#.to_vec(),
    )]);
    assert!(await_handshake(&mut source, &validator()).await.is_ok());
}
