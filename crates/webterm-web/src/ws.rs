//! The terminal WebSocket endpoint and the admin listing around it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use webterm_relay::{
    ClientFrame, ClientSink, ClientSource, CredentialResolver, Relay, RelayError, RelayOptions,
    RelayRegistry, RelayResult, RemoteSession, SessionOptions,
};
use webterm_types::{ControlChannelMode, ControlMessage};

use crate::auth::{extract_token, TokenValidator};
use crate::error::WebError;

/// How long a handshake-mode client gets to present its auth frame.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    resolver: Arc<dyn CredentialResolver>,
    validator: Arc<dyn TokenValidator>,
    registry: Arc<RelayRegistry>,
    mode: ControlChannelMode,
    session_options: Arc<SessionOptions>,
}

impl AppState {
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        validator: Arc<dyn TokenValidator>,
        mode: ControlChannelMode,
        session_options: Arc<SessionOptions>,
    ) -> Self {
        Self {
            resolver,
            validator,
            registry: Arc::new(RelayRegistry::new()),
            mode,
            session_options,
        }
    }

    pub fn registry(&self) -> &RelayRegistry {
        &self.registry
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/terminal/{host_id}", get(terminal_ws))
        .route("/api/terminal/{host_id}/status", get(terminal_status))
        .route("/api/terminals", get(list_relays))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct TerminalQuery {
    pub token: Option<String>,
    /// Initial terminal geometry reported by the browser.
    pub cols: Option<u16>,
    pub rows: Option<u16>,
}

#[derive(Serialize)]
struct StatusResponse {
    ok: bool,
    message: String,
}

fn authorize_inline(
    state: &AppState,
    params: &TerminalQuery,
    headers: &HeaderMap,
) -> Result<(), WebError> {
    let token = extract_token(params.token.as_deref(), headers)
        .ok_or(WebError::Unauthorized("missing access token"))?;
    if !state.validator.validate(&token) {
        return Err(WebError::Unauthorized("invalid access token"));
    }
    Ok(())
}

/// Upgrade handler for `/api/terminal/{host_id}`.
///
/// Inline mode authenticates before the upgrade is accepted; handshake mode
/// defers that to the first frame on the socket.
async fn terminal_ws(
    Path(host_id): Path<String>,
    Query(params): Query<TerminalQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if state.mode == ControlChannelMode::Inline {
        if let Err(err) = authorize_inline(&state, &params, &headers) {
            warn!(host = %host_id, error = %err, "terminal request rejected");
            return err.into_http_response();
        }
    }
    info!(host = %host_id, "terminal websocket accepted");
    ws.on_upgrade(move |socket| handle_socket(socket, host_id, params, state))
}

/// Preflight used by the frontend before it bothers opening a socket: checks
/// the token and that the host resolves, without dialing anything.
async fn terminal_status(
    Path(host_id): Path<String>,
    Query(params): Query<TerminalQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = authorize_inline(&state, &params, &headers) {
        let body = StatusResponse {
            ok: false,
            message: err.to_string(),
        };
        return (err.status(), Json(body)).into_response();
    }
    match state.resolver.resolve(&host_id).await {
        Ok(_) => {
            let body = StatusResponse {
                ok: true,
                message: "ready".to_string(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => {
            let err = WebError::from_relay(err, &host_id);
            let body = StatusResponse {
                ok: false,
                message: err.to_string(),
            };
            (err.status(), Json(body)).into_response()
        }
    }
}

/// Live relays, for the admin view.
async fn list_relays(
    Query(params): Query<TerminalQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = authorize_inline(&state, &params, &headers) {
        return err.into_http_response();
    }
    Json(state.registry.active()).into_response()
}

async fn handle_socket(socket: WebSocket, host_id: String, params: TerminalQuery, state: AppState) {
    let (sender, receiver) = socket.split();
    let mut sink = WsSink { sender };
    let mut source = WsSource { receiver };

    if state.mode == ControlChannelMode::AuthHandshake {
        if let Err(err) = await_handshake(&mut source, state.validator.as_ref()).await {
            warn!(host = %host_id, error = %err, "handshake failed");
            report_and_close(&mut sink, &err.to_string()).await;
            return;
        }
    }

    let (mut target, credential) = match state.resolver.resolve(&host_id).await {
        Ok(resolved) => resolved,
        Err(err) => {
            let err = WebError::from_relay(err, &host_id);
            warn!(host = %host_id, error = %err, "host resolution failed");
            report_and_close(&mut sink, &err.to_string()).await;
            return;
        }
    };
    if let Some(cols) = params.cols {
        target.width = cols;
    }
    if let Some(rows) = params.rows {
        target.height = rows;
    }

    let session = match RemoteSession::open(&target, &credential, &state.session_options).await {
        Ok(session) => session,
        Err(err) => {
            warn!(host = %host_id, error = %err, "session open failed");
            report_and_close(&mut sink, &err.to_string()).await;
            return;
        }
    };

    let id = state.registry.register(&host_id, &target);
    let registry = state.registry.clone();
    let relay = Relay::connect(
        source,
        sink,
        session,
        RelayOptions {
            hook: Some(Box::new(move |fault| registry.finish(id, fault))),
        },
    );
    match relay {
        Ok(relay) => relay.closed().await,
        // A fresh session cannot already be bridged; record it if it happens.
        Err(err) => state.registry.finish(id, Some(&err)),
    }
    debug!(host = %host_id, "terminal socket finished");
}

/// Read exactly one frame, which must be a valid auth control message with an
/// accepted token. Anything else closes the socket before a session exists.
async fn await_handshake<S: ClientSource>(
    source: &mut S,
    validator: &dyn TokenValidator,
) -> Result<(), WebError> {
    let frame = tokio::time::timeout(HANDSHAKE_TIMEOUT, source.recv())
        .await
        .map_err(|_| WebError::Unauthorized("authentication handshake timed out"))?;
    let frame = match frame {
        Some(Ok(ClientFrame::Close)) | None => {
            return Err(WebError::Unauthorized("client left before authenticating"));
        }
        Some(Ok(frame)) => frame,
        Some(Err(_)) => return Err(WebError::Unauthorized("socket failed during handshake")),
    };

    match ControlMessage::parse(&frame.into_bytes()) {
        Ok(Some(ControlMessage::Auth { token })) if validator.validate(&token) => Ok(()),
        Ok(Some(ControlMessage::Auth { .. })) => {
            Err(WebError::Unauthorized("invalid access token"))
        }
        _ => Err(WebError::Unauthorized("expected an auth frame first")),
    }
}

/// Failure before the relay exists: tell the terminal why, then close. The
/// browser renders the text in the terminal pane.
async fn report_and_close(sink: &mut WsSink, message: &str) {
    let _ = sink
        .send(ClientFrame::Text(format!("connection failed: {message}\r\n")))
        .await;
    let _ = sink.close().await;
}

struct WsSource {
    receiver: SplitStream<WebSocket>,
}

#[async_trait]
impl ClientSource for WsSource {
    async fn recv(&mut self) -> Option<RelayResult<ClientFrame>> {
        loop {
            match self.receiver.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(Ok(ClientFrame::Text(text.to_string())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return Some(Ok(ClientFrame::Binary(bytes.to_vec())));
                }
                Some(Ok(Message::Close(_))) => return Some(Ok(ClientFrame::Close)),
                // Ping/pong are answered by axum.
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    return Some(Err(RelayError::Transport(format!(
                        "websocket receive failed: {err}"
                    ))));
                }
                None => return None,
            }
        }
    }
}

struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl ClientSink for WsSink {
    async fn send(&mut self, frame: ClientFrame) -> RelayResult<()> {
        let message = match frame {
            ClientFrame::Text(text) => Message::Text(text.into()),
            ClientFrame::Binary(bytes) => Message::Binary(bytes.into()),
            ClientFrame::Close => Message::Close(None),
        };
        self.sender
            .send(message)
            .await
            .map_err(|err| RelayError::Transport(format!("websocket send failed: {err}")))
    }

    async fn close(&mut self) -> RelayResult<()> {
        self.sender
            .close()
            .await
            .map_err(|err| RelayError::Transport(format!("websocket close failed: {err}")))
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod ws_tests;
