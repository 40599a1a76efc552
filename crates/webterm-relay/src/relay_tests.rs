use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::*;
use crate::testutil::{stub_session, RemoteCtrl, RemoteEvent, StubRemote};

struct TestSource {
    rx: mpsc::UnboundedReceiver<RelayResult<ClientFrame>>,
}

#[async_trait]
impl ClientSource for TestSource {
    async fn recv(&mut self) -> Option<RelayResult<ClientFrame>> {
        self.rx.recv().await
    }
}

struct TestSink {
    tx: mpsc::UnboundedSender<ClientFrame>,
}

#[async_trait]
impl ClientSink for TestSink {
    async fn send(&mut self, frame: ClientFrame) -> RelayResult<()> {
        self.tx
            .send(frame)
            .map_err(|_| RelayError::Transport("client receiver gone".to_string()))
    }

    async fn close(&mut self) -> RelayResult<()> {
        Ok(())
    }
}

struct Harness {
    relay: Relay,
    stub: StubRemote,
    client_tx: mpsc::UnboundedSender<RelayResult<ClientFrame>>,
    client_rx: mpsc::UnboundedReceiver<ClientFrame>,
    hook_calls: Arc<AtomicUsize>,
    hook_fault: Arc<Mutex<Option<String>>>,
}

fn harness() -> Harness {
    let (session, stub) = stub_session();
    let (client_tx, source_rx) = mpsc::unbounded_channel();
    let (sink_tx, client_rx) = mpsc::unbounded_channel();

    let hook_calls = Arc::new(AtomicUsize::new(0));
    let hook_fault: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let calls = hook_calls.clone();
    let fault_slot = hook_fault.clone();

    let relay = Relay::connect(
        TestSource { rx: source_rx },
        TestSink { tx: sink_tx },
        session,
        RelayOptions {
            hook: Some(Box::new(move |fault| {
                calls.fetch_add(1, Ordering::SeqCst);
                *fault_slot.lock().unwrap() = fault.map(|f| f.to_string());
            })),
        },
    )
    .unwrap();

    Harness {
        relay,
        stub,
        client_tx,
        client_rx,
        hook_calls,
        hook_fault,
    }
}

async fn next_event(stub: &mut StubRemote) -> RemoteEvent {
    timeout(Duration::from_secs(1), stub.events_rx.recv())
        .await
        .expect("timed out waiting for remote event")
        .expect("remote driver gone")
}

async fn wait_closed(relay: &Relay) {
    timeout(Duration::from_secs(2), relay.closed())
        .await
        .expect("relay did not close in time");
}

#[tokio::test]
async fn resize_goes_to_the_pty_and_keystrokes_to_the_shell() {
    let mut h = harness();
    h.client_tx
        .send(Ok(ClientFrame::Text(
            r#"{"type":"resize","cols":132,"rows":43}"#.to_string(),
        )))
        .unwrap();
    h.client_tx
        .send(Ok(ClientFrame::Text("ls -la\n".to_string())))
        .unwrap();

    assert_eq!(next_event(&mut h.stub).await, RemoteEvent::Resize(132, 43));
    assert_eq!(
        next_event(&mut h.stub).await,
        RemoteEvent::Data(b"ls -la\n".to_vec())
    );
}

#[tokio::test]
async fn json_without_type_is_forwarded_as_keystrokes() {
    let mut h = harness();
    let pasted = r#"{"cols":120,"rows":40}"#;
    h.client_tx
        .send(Ok(ClientFrame::Text(pasted.to_string())))
        .unwrap();
    assert_eq!(
        next_event(&mut h.stub).await,
        RemoteEvent::Data(pasted.as_bytes().to_vec())
    );
}

#[tokio::test]
async fn malformed_control_is_forwarded_not_dropped() {
    let mut h = harness();
    let frame = r#"{"type":"detach"}"#;
    h.client_tx
        .send(Ok(ClientFrame::Text(frame.to_string())))
        .unwrap();
    assert_eq!(
        next_event(&mut h.stub).await,
        RemoteEvent::Data(frame.as_bytes().to_vec())
    );
}

#[tokio::test]
async fn auth_frame_on_live_session_is_ignored() {
    let mut h = harness();
    h.client_tx
        .send(Ok(ClientFrame::Text(
            r#"{"type":"auth","token":"tok"}"#.to_string(),
        )))
        .unwrap();
    h.client_tx
        .send(Ok(ClientFrame::Text("after\n".to_string())))
        .unwrap();
    // Only the keystrokes arrive; the auth frame is consumed.
    assert_eq!(
        next_event(&mut h.stub).await,
        RemoteEvent::Data(b"after\n".to_vec())
    );
}

#[tokio::test]
async fn binary_frames_are_forwarded_verbatim() {
    let mut h = harness();
    h.client_tx
        .send(Ok(ClientFrame::Binary(vec![0x1b, b'[', b'A'])))
        .unwrap();
    assert_eq!(
        next_event(&mut h.stub).await,
        RemoteEvent::Data(vec![0x1b, b'[', b'A'])
    );
}

#[tokio::test]
async fn remote_output_reaches_the_client_with_utf8_repair() {
    let mut h = harness();
    h.stub
        .ctrl_tx
        .send(RemoteCtrl::Output(b"caf\xc3".to_vec()))
        .await
        .unwrap();
    h.stub
        .ctrl_tx
        .send(RemoteCtrl::Output(b"\xa9!".to_vec()))
        .await
        .unwrap();
    h.stub.ctrl_tx.send(RemoteCtrl::FinishOutput).await.unwrap();

    let mut text = String::new();
    while let Some(frame) = timeout(Duration::from_secs(1), h.client_rx.recv())
        .await
        .expect("timed out waiting for client frame")
    {
        match frame {
            ClientFrame::Text(t) => text.push_str(&t),
            ClientFrame::Close => break,
            ClientFrame::Binary(_) => panic!("unexpected binary frame"),
        }
    }
    assert_eq!(text, "caf\u{e9}!");
}

#[tokio::test]
async fn clean_remote_exit_closes_everything_once() {
    let h = harness();
    h.stub.ctrl_tx.send(RemoteCtrl::FinishOutput).await.unwrap();

    wait_closed(&h.relay).await;
    assert_eq!(h.relay.state(), RelayState::Closed);
    assert_eq!(h.hook_calls.load(Ordering::SeqCst), 1);
    assert!(h.hook_fault.lock().unwrap().is_none());
    assert_eq!(h.stub.teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_disconnect_tears_down_the_session() {
    let h = harness();
    drop(h.client_tx);

    wait_closed(&h.relay).await;
    assert_eq!(h.hook_calls.load(Ordering::SeqCst), 1);
    assert!(h.hook_fault.lock().unwrap().is_none());
    assert_eq!(h.stub.teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn session_fault_reaches_the_lifecycle_hook() {
    let h = harness();
    h.stub
        .ctrl_tx
        .send(RemoteCtrl::Fault(RelayError::Transport(
            "keepalive expired".to_string(),
        )))
        .await
        .unwrap();
    h.stub.ctrl_tx.send(RemoteCtrl::FinishOutput).await.unwrap();

    wait_closed(&h.relay).await;
    assert_eq!(h.hook_calls.load(Ordering::SeqCst), 1);
    let fault = h.hook_fault.lock().unwrap().clone();
    assert!(fault.unwrap_or_default().contains("keepalive expired"));
}

#[tokio::test]
async fn close_is_idempotent_and_the_hook_fires_once() {
    let h = harness();
    h.relay.close();
    h.relay.close();
    h.relay.close();

    wait_closed(&h.relay).await;
    assert_eq!(h.hook_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.stub.teardowns.load(Ordering::SeqCst), 1);

    h.relay.close();
    assert_eq!(h.hook_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connect_rejects_an_already_bridged_session() {
    let (session, _stub) = stub_session();
    let _taken = session.take_output();
    let (_client_tx, source_rx) = mpsc::unbounded_channel();
    let (sink_tx, _client_rx) = mpsc::unbounded_channel();
    let err = Relay::connect(
        TestSource { rx: source_rx },
        TestSink { tx: sink_tx },
        session,
        RelayOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RelayError::Transport(_)));
}
