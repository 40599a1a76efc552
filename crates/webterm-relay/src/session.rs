//! Interactive shell sessions on managed hosts.
//!
//! [`RemoteSession::open`] dials, authenticates, allocates a PTY, starts the
//! login shell and hands ownership of the channel to a single driver task.
//! Everything after that goes through message passing: callers write bytes
//! and resizes into a command queue, the driver owns the only mutable handle
//! to the SSH channel, and remote output comes back on a bounded queue. The
//! driver is also the one place teardown runs, which is what makes closing
//! from several directions at once safe.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use russh::{client, Channel, ChannelMsg, Disconnect, Pty};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use webterm_types::{ConnectionTarget, Credential};

use crate::auth;
use crate::error::{RelayError, RelayResult};
use crate::handler::TrustingHandler;
use crate::keys;

/// Terminal modes requested with the PTY. Echo and newline translation on,
/// nominal 14.4k line speed; matches what an interactive login expects.
const TERMINAL_MODES: [(Pty, u32); 6] = [
    (Pty::ECHO, 1),
    (Pty::ICRNL, 1),
    (Pty::ONLCR, 1),
    (Pty::OPOST, 1),
    (Pty::TTY_OP_ISPEED, 14400),
    (Pty::TTY_OP_OSPEED, 14400),
];

const CMD_QUEUE_DEPTH: usize = 256;
const OUTPUT_QUEUE_DEPTH: usize = 1024;

/// Invoked exactly once when the session has fully released its resources.
pub type SessionCloseHook = Box<dyn FnOnce() + Send + 'static>;

pub(crate) enum SessionCmd {
    Data(Vec<u8>),
    Resize { cols: u16, rows: u16 },
    Shutdown,
}

/// Tuning knobs for opening and keeping a session.
pub struct SessionOptions {
    /// Deadline for TCP connect plus SSH handshake.
    pub dial_timeout: Duration,
    /// Protocol-level keepalive probe interval.
    pub keepalive_interval: Duration,
    /// Unanswered probes tolerated before the transport is declared dead.
    pub keepalive_max: usize,
    /// Directories scanned for a key when the host is configured keyless.
    pub local_key_dirs: Vec<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(30),
            keepalive_max: 1,
            local_key_dirs: keys::default_key_dirs(),
        }
    }
}

/// A live shell session. Cheap handle over channels into the driver task.
pub struct RemoteSession {
    cmd_tx: mpsc::Sender<SessionCmd>,
    output_rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    close_tx: broadcast::Sender<()>,
    closed: Arc<AtomicBool>,
    close_requested: AtomicBool,
    fault: Arc<Mutex<Option<RelayError>>>,
    close_hook: Arc<Mutex<Option<SessionCloseHook>>>,
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("closed", &self.closed)
            .field("close_requested", &self.close_requested)
            .finish_non_exhaustive()
    }
}

impl RemoteSession {
    /// Dial, authenticate and start an interactive shell on `target`.
    ///
    /// Credential material is prepared before the dial so key problems are
    /// reported without ever touching the network.
    pub async fn open(
        target: &ConnectionTarget,
        credential: &Credential,
        options: &SessionOptions,
    ) -> RelayResult<Self> {
        if let Err(field) = target.validate() {
            return Err(RelayError::EmptyField { field });
        }
        let material = auth::prepare(credential, &options.local_key_dirs)?;

        let config = Arc::new(client::Config {
            keepalive_interval: Some(options.keepalive_interval),
            keepalive_max: options.keepalive_max,
            nodelay: true,
            ..Default::default()
        });

        let address = target.address();
        info!(host = %address, user = %target.username, method = credential.method(),
              "opening remote session");

        let mut handle = tokio::time::timeout(
            options.dial_timeout,
            client::connect(config, (target.host.as_str(), target.port), TrustingHandler),
        )
        .await
        .map_err(|_| RelayError::DialTimeout {
            address: address.clone(),
            timeout: options.dial_timeout,
        })?
        .map_err(|source| RelayError::Dial {
            address: address.clone(),
            source,
        })?;

        auth::authenticate(&mut handle, &target.username, material).await?;

        let channel = handle.channel_open_session().await.map_err(RelayError::Pty)?;
        let (cols, rows) = target.pty_size();
        channel
            .request_pty(
                true,
                &target.term,
                u32::from(cols),
                u32::from(rows),
                0,
                0,
                &TERMINAL_MODES,
            )
            .await
            .map_err(RelayError::Pty)?;
        channel.request_shell(true).await.map_err(RelayError::Pty)?;
        debug!(host = %address, cols, rows, "pty allocated, shell running");

        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_QUEUE_DEPTH);
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_QUEUE_DEPTH);
        let (close_tx, _) = broadcast::channel(1);
        let closed = Arc::new(AtomicBool::new(false));
        let fault = Arc::new(Mutex::new(None));
        let close_hook: Arc<Mutex<Option<SessionCloseHook>>> = Arc::new(Mutex::new(None));

        tokio::spawn(drive(
            handle,
            channel,
            cmd_rx,
            output_tx,
            close_tx.clone(),
            closed.clone(),
            fault.clone(),
            close_hook.clone(),
        ));

        Ok(Self::from_parts(cmd_tx, output_rx, close_tx, closed, fault, close_hook))
    }

    pub(crate) fn from_parts(
        cmd_tx: mpsc::Sender<SessionCmd>,
        output_rx: mpsc::Receiver<Vec<u8>>,
        close_tx: broadcast::Sender<()>,
        closed: Arc<AtomicBool>,
        fault: Arc<Mutex<Option<RelayError>>>,
        close_hook: Arc<Mutex<Option<SessionCloseHook>>>,
    ) -> Self {
        Self {
            cmd_tx,
            output_rx: Mutex::new(Some(output_rx)),
            close_tx,
            closed,
            close_requested: AtomicBool::new(false),
            fault,
            close_hook,
        }
    }

    /// Take the remote output stream. Yields `Some` exactly once; the relay
    /// that bridges this session is its single consumer.
    pub fn take_output(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.output_rx.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Queue keystrokes for the remote shell's stdin.
    pub async fn write(&self, data: Vec<u8>) -> RelayResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.is_closed() {
            return Err(RelayError::Transport("write on closed session".to_string()));
        }
        self.cmd_tx
            .send(SessionCmd::Data(data))
            .await
            .map_err(|_| RelayError::Transport("session input queue is gone".to_string()))
    }

    /// Apply a window geometry change to the PTY. Never blocks the caller;
    /// a resize that cannot be queued is dropped, since only the most recent
    /// effective size matters.
    pub fn resize(&self, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            warn!(cols, rows, "ignoring degenerate resize");
            return;
        }
        if self.is_closed() {
            warn!(cols, rows, "resize after close ignored");
            return;
        }
        if self.cmd_tx.try_send(SessionCmd::Resize { cols, rows }).is_err() {
            debug!(cols, rows, "resize dropped, input queue busy or closed");
        }
    }

    /// Register the hook fired once when teardown completes. Must be set
    /// before the session ends to be guaranteed a call.
    pub fn set_close_hook(&self, hook: SessionCloseHook) {
        *self.close_hook.lock().unwrap_or_else(|e| e.into_inner()) = Some(hook);
    }

    /// Ask the driver to tear the session down. Idempotent: repeated and
    /// concurrent calls all return `Ok` and release happens exactly once.
    pub async fn close(&self) -> RelayResult<()> {
        if self.close_requested.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // A send failure means the driver already finished its teardown,
        // which is exactly the state close() wants to reach.
        let _ = self.cmd_tx.send(SessionCmd::Shutdown).await;
        Ok(())
    }

    /// Resolve once the driver has finished teardown.
    pub async fn wait_closed(&self) {
        let mut rx = self.close_tx.subscribe();
        // Subscribe before checking so the signal cannot slip between the
        // check and the wait.
        if self.is_closed() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Take the first fault recorded by the driver, if the session ended in
    /// one. Clean shell exits leave this empty.
    pub fn take_fault(&self) -> Option<RelayError> {
        self.fault.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Single owner of the SSH channel and transport handle. Multiplexes the
/// caller's command queue against remote traffic, then runs the ordered
/// release sequence no matter which side ended the session.
#[allow(clippy::too_many_arguments)]
async fn drive(
    handle: client::Handle<TrustingHandler>,
    mut channel: Channel<client::Msg>,
    mut cmd_rx: mpsc::Receiver<SessionCmd>,
    output_tx: mpsc::Sender<Vec<u8>>,
    close_tx: broadcast::Sender<()>,
    closed: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<RelayError>>>,
    close_hook: Arc<Mutex<Option<SessionCloseHook>>>,
) {
    let mut exit_seen = false;
    let mut first_fault: Option<RelayError> = None;

    loop {
        tokio::select! {
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    if output_tx.send(data.to_vec()).await.is_err() {
                        break;
                    }
                }
                // stderr shares the ordered output stream with stdout.
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    if output_tx.send(data.to_vec()).await.is_err() {
                        break;
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!(exit_status, "remote shell exited");
                    exit_seen = true;
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) => break,
                Some(_) => {}
                None => {
                    if !exit_seen {
                        first_fault = Some(RelayError::Transport(
                            "ssh transport closed unexpectedly".to_string(),
                        ));
                    }
                    break;
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(SessionCmd::Data(bytes)) => {
                    let mut cursor = Cursor::new(bytes);
                    if let Err(err) = channel.data(&mut cursor).await {
                        first_fault = Some(RelayError::Transport(format!(
                            "write to remote shell failed: {err}"
                        )));
                        break;
                    }
                }
                Some(SessionCmd::Resize { cols, rows }) => {
                    if let Err(err) = channel
                        .window_change(u32::from(cols), u32::from(rows), 0, 0)
                        .await
                    {
                        // Remote may already be winding down; resize is
                        // best-effort.
                        warn!(error = %err, "pty resize rejected");
                    }
                }
                Some(SessionCmd::Shutdown) | None => break,
            },
        }
    }

    // Ordered release. Each step runs even if an earlier one fails; step
    // failures are collected so the lifecycle hook can see a dirty teardown.
    closed.store(true, Ordering::SeqCst);
    cmd_rx.close();
    let mut teardown_errors = Vec::new();
    if let Err(err) = channel.eof().await {
        debug!(error = %err, "channel eof during teardown");
        teardown_errors.push(format!("channel eof: {err}"));
    }
    if let Err(err) = channel.close().await {
        debug!(error = %err, "channel close during teardown");
        teardown_errors.push(format!("channel close: {err}"));
    }
    if let Err(err) = handle
        .disconnect(Disconnect::ByApplication, "session closed", "en")
        .await
    {
        debug!(error = %err, "transport disconnect during teardown");
        teardown_errors.push(format!("disconnect: {err}"));
    }

    if let Some(err) = first_fault {
        fault
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_or_insert(err);
    }
    record_teardown_fault(&fault, teardown_errors);
    drop(output_tx);
    let _ = close_tx.send(());
    let hook = close_hook.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(hook) = hook {
        hook();
    }
    debug!("session driver finished");
}

/// Fold release-step failures into the fault slot. A fault from the live
/// session keeps precedence; a clean run records nothing.
pub(crate) fn record_teardown_fault(fault: &Mutex<Option<RelayError>>, errors: Vec<String>) {
    if errors.is_empty() {
        return;
    }
    fault
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get_or_insert_with(|| {
            RelayError::Transport(format!("teardown incomplete: {}", errors.join("; ")))
        });
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
