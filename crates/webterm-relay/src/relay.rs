//! The bridge between a client-facing duplex stream and a remote session.
//!
//! Two pumps and a supervisor. The inbound pump classifies client frames
//! (resize and auth control versus raw keystrokes) and feeds the session; the
//! outbound pump repairs UTF-8 boundaries in remote output and ships text
//! frames to the client. Whichever side ends first signals the other, and the
//! supervisor runs teardown exactly once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use webterm_types::ControlMessage;

use crate::error::{RelayError, RelayResult};
use crate::session::RemoteSession;
use crate::utf8::Utf8Stitcher;

/// A message on the client-facing stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientFrame {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

impl ClientFrame {
    /// Payload bytes of the frame; empty for `Close`.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ClientFrame::Text(text) => text.into_bytes(),
            ClientFrame::Binary(bytes) => bytes,
            ClientFrame::Close => Vec::new(),
        }
    }
}

/// Client-to-relay half of the duplex stream.
#[async_trait]
pub trait ClientSource: Send {
    /// Next frame from the client; `None` once the peer is gone.
    async fn recv(&mut self) -> Option<RelayResult<ClientFrame>>;
}

/// Relay-to-client half of the duplex stream.
#[async_trait]
pub trait ClientSink: Send {
    async fn send(&mut self, frame: ClientFrame) -> RelayResult<()>;
    async fn close(&mut self) -> RelayResult<()>;
}

/// Where a relay is in its life. Strictly forward-moving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayState {
    /// Session dialing and PTY setup are still in flight.
    Connecting,
    /// Both pumps are running.
    Active,
    /// One side ended; teardown is in progress.
    Closing,
    /// Everything is released and the lifecycle hook has fired.
    Closed,
}

/// Invoked exactly once when the relay has fully shut down. Receives the
/// fault that ended it, or `None` for a clean exit on either side.
pub type LifecycleHook = Box<dyn FnOnce(Option<&RelayError>) + Send + 'static>;

#[derive(Default)]
pub struct RelayOptions {
    pub hook: Option<LifecycleHook>,
}

/// Handle to a running bridge. Dropping it does not stop the pumps; call
/// [`Relay::close`] or let either end of the stream finish.
#[derive(Debug)]
pub struct Relay {
    state_rx: watch::Receiver<RelayState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Relay {
    /// Bridge `session` to the client stream. The session must be freshly
    /// opened: its output may only ever have one consumer.
    pub fn connect<Src, Snk>(
        source: Src,
        sink: Snk,
        session: RemoteSession,
        options: RelayOptions,
    ) -> RelayResult<Relay>
    where
        Src: ClientSource + 'static,
        Snk: ClientSink + 'static,
    {
        if session.is_closed() {
            return Err(RelayError::Transport("remote session is not active".to_string()));
        }
        let output_rx = session.take_output().ok_or_else(|| {
            RelayError::Transport("remote session is already bridged".to_string())
        })?;

        let session = Arc::new(session);
        let (state_tx, state_rx) = watch::channel(RelayState::Connecting);
        let (shutdown_tx, _) = broadcast::channel(1);

        let inbound = tokio::spawn(inbound_pump(
            source,
            session.clone(),
            shutdown_tx.clone(),
            shutdown_tx.subscribe(),
        ));
        let outbound = tokio::spawn(outbound_pump(
            sink,
            output_rx,
            shutdown_tx.clone(),
            shutdown_tx.subscribe(),
        ));
        let _ = state_tx.send(RelayState::Active);
        tokio::spawn(supervise(inbound, outbound, session, state_tx, options.hook));

        Ok(Relay {
            state_rx,
            shutdown_tx,
        })
    }

    pub fn state(&self) -> RelayState {
        *self.state_rx.borrow()
    }

    /// Ask both pumps to stop. Safe to call from anywhere, any number of
    /// times; the actual teardown still runs once in the supervisor.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Resolve once the relay reaches [`RelayState::Closed`].
    pub async fn closed(&self) {
        let mut rx = self.state_rx.clone();
        while *rx.borrow() != RelayState::Closed {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Client frames toward the session. Resizes are applied to the PTY and never
/// forwarded; a post-session auth frame is ignored; everything else is
/// keystrokes.
async fn inbound_pump<Src: ClientSource>(
    mut source: Src,
    session: Arc<RemoteSession>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Option<RelayError> {
    let mut fault = None;
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            frame = source.recv() => match frame {
                Some(Ok(ClientFrame::Close)) | None => {
                    debug!("client disconnected");
                    break;
                }
                Some(Ok(frame)) => {
                    let bytes = frame.into_bytes();
                    match ControlMessage::parse(&bytes) {
                        Ok(Some(ControlMessage::Resize { cols, rows })) => {
                            debug!(cols, rows, "applying client resize");
                            session.resize(cols, rows);
                        }
                        Ok(Some(ControlMessage::Auth { .. })) => {
                            debug!("ignoring auth frame on an established session");
                        }
                        Ok(None) => {
                            if let Err(err) = session.write(bytes).await {
                                fault = Some(err);
                                break;
                            }
                        }
                        Err(violation) => {
                            // Do not eat input that merely looks structured.
                            warn!(error = %violation, "forwarding malformed control frame as data");
                            if let Err(err) = session.write(bytes).await {
                                fault = Some(err);
                                break;
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    fault = Some(err);
                    break;
                }
            },
        }
    }
    let _ = shutdown_tx.send(());
    fault
}

/// Remote output toward the client, stitched into valid UTF-8 text frames.
/// Returns the sink so the supervisor can send the final close.
async fn outbound_pump<Snk: ClientSink>(
    mut sink: Snk,
    mut output_rx: mpsc::Receiver<Vec<u8>>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> (Option<RelayError>, Snk) {
    let mut stitcher = Utf8Stitcher::new();
    let mut fault = None;
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            chunk = output_rx.recv() => match chunk {
                Some(bytes) => {
                    let text = stitcher.push(&bytes);
                    if text.is_empty() {
                        continue;
                    }
                    if let Err(err) = sink.send(ClientFrame::Text(text)).await {
                        fault = Some(err);
                        break;
                    }
                }
                None => {
                    debug!("remote output stream ended");
                    let tail = stitcher.flush();
                    if !tail.is_empty() {
                        let _ = sink.send(ClientFrame::Text(tail)).await;
                    }
                    break;
                }
            },
        }
    }
    let _ = shutdown_tx.send(());
    (fault, sink)
}

/// Joins both pumps, then runs the one-and-only teardown: close the session,
/// close the client stream, fire the hook.
async fn supervise<Snk: ClientSink>(
    inbound: JoinHandle<Option<RelayError>>,
    outbound: JoinHandle<(Option<RelayError>, Snk)>,
    session: Arc<RemoteSession>,
    state_tx: watch::Sender<RelayState>,
    hook: Option<LifecycleHook>,
) {
    let (inbound_fault, outbound_result) = tokio::join!(inbound, outbound);
    let inbound_fault = inbound_fault.unwrap_or_else(|err| {
        Some(RelayError::Transport(format!("inbound pump panicked: {err}")))
    });
    let (outbound_fault, mut sink) = match outbound_result {
        Ok(result) => result,
        Err(err) => {
            // Without the sink there is nothing left to close client-side;
            // still release the session below.
            warn!(error = %err, "outbound pump panicked");
            let _ = state_tx.send(RelayState::Closing);
            let _ = session.close().await;
            session.wait_closed().await;
            let fault = inbound_fault.or(session.take_fault());
            let _ = state_tx.send(RelayState::Closed);
            if let Some(hook) = hook {
                hook(fault.as_ref());
            }
            return;
        }
    };

    let _ = state_tx.send(RelayState::Closing);

    let _ = session.close().await;
    if tokio::time::timeout(Duration::from_secs(5), session.wait_closed())
        .await
        .is_err()
    {
        warn!("session teardown did not confirm within 5s");
    }

    if let Err(err) = sink.send(ClientFrame::Close).await {
        debug!(error = %err, "client already gone for close frame");
    }
    if let Err(err) = sink.close().await {
        debug!(error = %err, "client stream close failed");
    }

    let fault = inbound_fault.or(outbound_fault).or(session.take_fault());
    let _ = state_tx.send(RelayState::Closed);
    if let Some(hook) = hook {
        hook(fault.as_ref());
    }
    match &fault {
        None => debug!("relay finished cleanly"),
        Some(err) => debug!(error = %err, "relay finished with fault"),
    }
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod relay_tests;
