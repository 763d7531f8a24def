//! Shard connection
//!
//! One [`Connection`] owns one websocket session. A supervisor task runs
//! sessions back to back: connect, wait for Hello, identify or resume, then
//! read frames until the socket drops, the gateway asks for a reconnect, the
//! heartbeat goes unacknowledged or the shard is shut down.
//!
//! ```text
//! Disconnected -> Connecting -> Identifying -> Connected
//!                                  \-> Resuming -> Connected
//! Connected -> Disconnected   (zombie, dropped socket; reconnects)
//! any -> Closed               (fatal close code, disconnect())
//! ```

use super::backoff::ExponentialBackoff;
use super::session::ShardSession;
use crate::command::Command;
use crate::error::{GatewayError, GatewayResult};
use crate::events::{EventEnvelope, TrackedEvents};
use crate::protocol::{
    CloseCode, GatewayMessage, HelloPayload, IdentifyPayload, IdentifyProperties, Intents, OpCode,
    RawFrame, ReadySession, ResumePayload, UpdateStatus,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use guildlink_common::{RateLimitError, RateLimiter};
use guildlink_core::Snowflake;
use parking_lot::Mutex;
use rand::Rng;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Shared bucket serializing identifies across every shard
pub const IDENTIFY_BUCKET: &str = "ws:identify";

/// Commands allowed per shard per [`COMMAND_WINDOW`], heartbeats included
pub const COMMAND_LIMIT: u32 = 120;
pub const COMMAND_WINDOW: Duration = Duration::from_secs(60);

const HELLO_TIMEOUT: Duration = Duration::from_secs(20);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code sent when dropping a zombied socket; anything but 1000/1001
/// keeps the session resumable.
const RESUMABLE_CLOSE: u16 = 4900;

/// How [`Connection::disconnect`] closes the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// Normal close; the gateway ends the session
    Close,
    /// Resumable close; the session survives for a later resume
    KeepSession,
}

impl Disconnect {
    fn close_code(self) -> u16 {
        match self {
            Self::Close => 1000,
            Self::KeepSession => RESUMABLE_CLOSE,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            Self::Close => "shutting down",
            Self::KeepSession => "suspending",
        }
    }
}

/// Rate limit bucket for a shard's outgoing commands
pub fn command_bucket(shard_id: u32) -> String {
    format!("ws:{shard_id}:commands")
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    /// Opening the websocket and waiting for Hello
    Connecting,
    /// Hello received, sending Identify
    Identifying,
    Connected,
    /// Hello received, Resume sent, waiting for RESUMED
    Resuming,
    /// Shut down for good
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Identifying => "identifying",
            Self::Connected => "connected",
            Self::Resuming => "resuming",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Settings for one shard
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub shard_id: u32,
    pub shard_count: u32,
    /// Gateway URL without query string
    pub url: String,
    pub token: String,
    pub intents: Intents,
    pub large_threshold: u32,
    pub gateway_version: u8,
    pub project_name: String,
    pub presence: Option<UpdateStatus>,
    /// How long `open` waits for READY
    pub ready_timeout: Duration,
}

impl ConnectionConfig {
    fn connect_url(&self, base: &str) -> String {
        let separator = if base.contains('?') { '&' } else { '?' };
        format!(
            "{base}{separator}v={}&encoding=json",
            self.gateway_version
        )
    }

    fn identify_payload(&self) -> IdentifyPayload {
        IdentifyPayload {
            token: self.token.clone(),
            properties: IdentifyProperties::library(&self.project_name),
            compress: false,
            large_threshold: self.large_threshold,
            shard: Some([self.shard_id, self.shard_count]),
            presence: self.presence.clone(),
            intents: self.intents.bits(),
        }
    }
}

/// How a single websocket session ended
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    Fatal(GatewayError),
    Reconnect {
        resume: bool,
        delay: Duration,
        /// Set when the session failed rather than being asked to reconnect
        error: Option<GatewayError>,
    },
}

impl SessionEnd {
    fn failed(error: GatewayError) -> Self {
        Self::Reconnect {
            resume: true,
            delay: Duration::ZERO,
            error: Some(error),
        }
    }

    fn reconnect(resume: bool, delay: Duration) -> Self {
        Self::Reconnect {
            resume,
            delay,
            error: None,
        }
    }
}

/// A single gateway shard
pub struct Connection {
    config: ConnectionConfig,
    limiter: Arc<RateLimiter>,
    tracked: Arc<TrackedEvents>,
    events: mpsc::Sender<EventEnvelope>,
    state: watch::Sender<ConnectionState>,
    /// Flips to true on the first READY and stays there
    ready: watch::Sender<bool>,
    shutdown: watch::Sender<Option<Disconnect>>,
    session: Mutex<ShardSession>,
    /// Guilds this shard has received GUILD_CREATE for
    guilds: Mutex<Vec<Snowflake>>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub fn new(
        config: ConnectionConfig,
        limiter: Arc<RateLimiter>,
        tracked: Arc<TrackedEvents>,
        events: mpsc::Sender<EventEnvelope>,
    ) -> Arc<Self> {
        let shard_id = config.shard_id;
        Arc::new(Self {
            config,
            limiter,
            tracked,
            events,
            state: watch::channel(ConnectionState::Disconnected).0,
            ready: watch::channel(false).0,
            shutdown: watch::channel(None).0,
            session: Mutex::new(ShardSession::new(shard_id)),
            guilds: Mutex::new(Vec::new()),
            outgoing: Mutex::new(None),
            task: Mutex::new(None),
        })
    }

    #[inline]
    pub fn shard_id(&self) -> u32 {
        self.config.shard_id
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Snapshot of the session state
    pub fn session(&self) -> ShardSession {
        self.session.lock().clone()
    }

    pub fn heartbeat_latency(&self) -> Option<Duration> {
        self.session.lock().latency
    }

    pub fn has_received_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    pub fn guilds(&self) -> Vec<Snowflake> {
        self.guilds.lock().clone()
    }

    /// Returns false when the guild was already listed
    pub fn add_guild(&self, guild_id: Snowflake) -> bool {
        let mut guilds = self.guilds.lock();
        if guilds.contains(&guild_id) {
            return false;
        }
        guilds.push(guild_id);
        true
    }

    pub fn remove_guild(&self, guild_id: Snowflake) -> bool {
        let mut guilds = self.guilds.lock();
        match guilds.iter().position(|id| *id == guild_id) {
            Some(index) => {
                guilds.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear_guilds(&self) {
        self.guilds.lock().clear();
    }

    /// Bring the shard up and wait for its READY (or RESUMED)
    ///
    /// Failures before READY are returned instead of retried. Once this
    /// returns `Ok`, later disconnects are recovered in the background.
    pub async fn open(self: &Arc<Self>) -> GatewayResult<()> {
        if self
            .task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return Ok(());
        }

        self.shutdown.send_replace(None);
        let (handshake_tx, handshake_rx) = oneshot::channel();
        let handle = tokio::spawn(Arc::clone(self).run(handshake_tx));
        *self.task.lock() = Some(handle);

        match tokio::time::timeout(self.config.ready_timeout, handshake_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::ConnectionClosed {
                shard_id: self.shard_id(),
            }),
            Err(_) => {
                let _ = self.disconnect(Disconnect::Close).await;
                Err(GatewayError::HandshakeTimeout {
                    shard_id: self.shard_id(),
                    expected: "READY",
                    timeout: self.config.ready_timeout,
                })
            }
        }
    }

    /// Close the websocket and stop reconnecting
    ///
    /// `mode` picks the close code; only [`Disconnect::KeepSession`] leaves
    /// the session resumable on the gateway side.
    pub async fn disconnect(&self, mode: Disconnect) -> GatewayResult<()> {
        self.shutdown.send_replace(Some(mode));
        let task = self.task.lock().take();
        let result = match task {
            Some(task) => {
                let abort = task.abort_handle();
                match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(GatewayError::Shutdown {
                        shard_id: self.shard_id(),
                        reason: e.to_string(),
                    }),
                    Err(_) => {
                        abort.abort();
                        Err(GatewayError::Shutdown {
                            shard_id: self.shard_id(),
                            reason: format!("no exit within {SHUTDOWN_TIMEOUT:?}"),
                        })
                    }
                }
            }
            None => Ok(()),
        };
        self.set_state(ConnectionState::Closed);
        result
    }

    /// Queue a user command, honoring the shard's command bucket
    pub async fn send_command(&self, command: &Command) -> GatewayResult<()> {
        let message = command.to_message()?;
        self.limiter.acquire(&command_bucket(self.shard_id())).await?;
        debug!(shard_id = self.shard_id(), command = command.name(), "Sending command");
        self.send_message(&message)
    }

    fn send_message(&self, message: &GatewayMessage) -> GatewayResult<()> {
        let text = message.to_json()?;
        let outgoing = self.outgoing.lock();
        match outgoing.as_ref() {
            Some(tx) if tx.send(Message::Text(text)).is_ok() => Ok(()),
            _ => Err(GatewayError::NotConnected(self.shard_id())),
        }
    }

    async fn send_heartbeat(&self) -> GatewayResult<()> {
        wait_for_bucket(&self.limiter, &command_bucket(self.shard_id())).await;
        let sequence = self.session.lock().heartbeat_sent(Instant::now());
        trace!(shard_id = self.shard_id(), ?sequence, "Sending heartbeat");
        self.send_message(&GatewayMessage::heartbeat(sequence))
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!(shard_id = self.shard_id(), from = %previous, to = %state, "Shard state changed");
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.borrow().is_some()
    }

    /// Supervisor: run sessions until shutdown or a fatal close
    async fn run(self: Arc<Self>, handshake: oneshot::Sender<GatewayResult<()>>) {
        let mut handshake = Some(handshake);
        let backoff = ExponentialBackoff::default();
        let mut attempt = 0u32;

        loop {
            let end = self.run_session(&mut handshake).await;
            *self.outgoing.lock() = None;

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Fatal(err) => {
                    error!(shard_id = self.shard_id(), error = %err, "Shard closed permanently");
                    if let Some(tx) = handshake.take() {
                        let _ = tx.send(Err(err));
                    }
                    break;
                }
                SessionEnd::Reconnect {
                    resume,
                    delay,
                    error,
                } => {
                    if !resume {
                        self.session.lock().invalidate();
                    }
                    self.set_state(ConnectionState::Disconnected);

                    let wait = match error {
                        Some(err) => {
                            if let Some(tx) = handshake.take() {
                                error!(shard_id = self.shard_id(), error = %err, "Shard failed to connect");
                                let _ = tx.send(Err(err));
                                break;
                            }
                            let wait = backoff.delay(attempt);
                            attempt = attempt.saturating_add(1);
                            warn!(
                                shard_id = self.shard_id(),
                                error = %err,
                                attempt,
                                wait_ms = wait.as_millis() as u64,
                                "Shard connection lost, reconnecting"
                            );
                            wait
                        }
                        None => {
                            attempt = 0;
                            delay
                        }
                    };

                    if self.sleep_unless_shutdown(wait).await {
                        break;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Closed);
    }

    /// Returns true when shutdown was requested during the wait
    async fn sleep_unless_shutdown(&self, wait: Duration) -> bool {
        let mut shutdown = self.shutdown.subscribe();
        if shutdown.borrow_and_update().is_some() {
            return true;
        }
        if wait.is_zero() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(wait) => false,
            _ = shutdown_requested(&mut shutdown) => true,
        }
    }

    async fn run_session(
        self: &Arc<Self>,
        handshake: &mut Option<oneshot::Sender<GatewayResult<()>>>,
    ) -> SessionEnd {
        let shard_id = self.shard_id();
        let mut shutdown = self.shutdown.subscribe();
        if shutdown.borrow_and_update().is_some() {
            return SessionEnd::Shutdown;
        }

        self.set_state(ConnectionState::Connecting);
        let base = self
            .session
            .lock()
            .resume_url
            .clone()
            .unwrap_or_else(|| self.config.url.clone());
        let url = self.config.connect_url(&base);

        let socket = tokio::select! {
            result = connect_async(url.as_str()) => match result {
                Ok((socket, _)) => socket,
                Err(e) => return SessionEnd::failed(e.into()),
            },
            _ = shutdown_requested(&mut shutdown) => return SessionEnd::Shutdown,
        };
        debug!(shard_id, url = %url, "Websocket opened");

        let (sink, mut stream) = socket.split();
        let hello = match self.await_hello(&mut stream).await {
            Ok(hello) => hello,
            Err(e) => return SessionEnd::failed(e),
        };
        let interval = Duration::from_millis(hello.heartbeat_interval.max(1));
        self.session.lock().start_heartbeating(interval);
        self.set_state(ConnectionState::Identifying);

        let (tx, rx) = mpsc::unbounded_channel();
        *self.outgoing.lock() = Some(tx.clone());
        let writer = tokio::spawn(write_loop(sink, rx, shard_id));

        if let Err(e) = self.send_handshake().await {
            writer.abort();
            return SessionEnd::failed(e);
        }

        let (zombie_tx, mut zombie_rx) = oneshot::channel();
        let heartbeat = tokio::spawn(heartbeat_loop(Arc::clone(self), interval, zombie_tx));

        let end = loop {
            tokio::select! {
                mode = shutdown_requested(&mut shutdown) => {
                    let _ = tx.send(close_message(mode.close_code(), mode.reason()));
                    break SessionEnd::Shutdown;
                }
                _ = &mut zombie_rx => {
                    warn!(shard_id, "Heartbeat not acknowledged, dropping zombied connection");
                    let _ = tx.send(close_message(RESUMABLE_CLOSE, "zombied connection"));
                    break SessionEnd::reconnect(true, Duration::ZERO);
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(end) = self.handle_text(&text, handshake).await {
                            let _ = tx.send(close_message(RESUMABLE_CLOSE, "reconnecting"));
                            break end;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => break self.handle_close(frame),
                    Some(Ok(Message::Binary(_))) => {
                        debug!(shard_id, "Dropping binary frame");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break SessionEnd::failed(e.into()),
                    None => break SessionEnd::failed(GatewayError::ConnectionClosed { shard_id }),
                },
            }
        };

        heartbeat.abort();
        *self.outgoing.lock() = None;
        drop(tx);
        let _ = tokio::time::timeout(Duration::from_secs(1), writer).await;
        end
    }

    async fn await_hello(&self, stream: &mut SplitStream<WsStream>) -> GatewayResult<HelloPayload> {
        let shard_id = self.shard_id();
        let wait = async {
            while let Some(frame) = stream.next().await {
                match frame? {
                    Message::Text(text) => {
                        let message = GatewayMessage::from_json(&text)?;
                        return message.as_hello().ok_or(GatewayError::UnexpectedFrame {
                            expected: "Hello",
                            got: message.op.to_string(),
                        });
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Err(GatewayError::ConnectionClosed { shard_id })
        };

        tokio::time::timeout(HELLO_TIMEOUT, wait)
            .await
            .map_err(|_| GatewayError::HandshakeTimeout {
                shard_id,
                expected: "Hello",
                timeout: HELLO_TIMEOUT,
            })?
    }

    /// Resume when the session allows it, identify otherwise
    async fn send_handshake(&self) -> GatewayResult<()> {
        let shard_id = self.shard_id();
        let resume = self.session.lock().resume_info();

        match resume {
            Some((session_id, seq)) => {
                self.set_state(ConnectionState::Resuming);
                wait_for_bucket(&self.limiter, &command_bucket(shard_id)).await;
                info!(shard_id, session_id = %session_id, seq, "Resuming session");
                self.send_message(&GatewayMessage::resume(&ResumePayload {
                    token: self.config.token.clone(),
                    session_id,
                    seq,
                })?)
            }
            None => {
                wait_for_bucket(&self.limiter, IDENTIFY_BUCKET).await;
                info!(shard_id, shard_count = self.config.shard_count, "Identifying");
                self.send_message(&GatewayMessage::identify(&self.config.identify_payload())?)?;
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
        }
    }

    /// Handle one text frame; `Some` ends the session
    async fn handle_text(
        &self,
        text: &str,
        handshake: &mut Option<oneshot::Sender<GatewayResult<()>>>,
    ) -> Option<SessionEnd> {
        let shard_id = self.shard_id();
        let frame = match RawFrame::from_json(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(shard_id, error = %e, "Dropping undecodable frame");
                return None;
            }
        };
        trace!(shard_id, op = %frame.op, "Received frame");

        match frame.op {
            OpCode::Dispatch => {
                self.handle_dispatch(&frame, handshake).await;
                None
            }
            OpCode::Heartbeat => {
                if let Err(e) = self.send_heartbeat().await {
                    debug!(shard_id, error = %e, "Requested heartbeat not sent");
                }
                None
            }
            OpCode::HeartbeatAck => {
                self.session.lock().heartbeat_acked(Instant::now());
                None
            }
            OpCode::Reconnect => {
                info!(shard_id, "Gateway requested reconnect");
                Some(SessionEnd::reconnect(true, Duration::ZERO))
            }
            OpCode::InvalidSession => {
                if frame.as_invalid_session().unwrap_or(false) {
                    info!(shard_id, "Session invalidated, resuming");
                    return Some(SessionEnd::reconnect(true, Duration::ZERO));
                }
                let delay = Duration::from_millis(rand::thread_rng().gen_range(1000..=5000));
                warn!(
                    shard_id,
                    delay_ms = delay.as_millis() as u64,
                    "Session invalidated, identifying again"
                );
                Some(SessionEnd::reconnect(false, delay))
            }
            other => {
                debug!(shard_id, op = %other, "Ignoring unexpected op code");
                None
            }
        }
    }

    async fn handle_dispatch(
        &self,
        frame: &RawFrame<'_>,
        handshake: &mut Option<oneshot::Sender<GatewayResult<()>>>,
    ) {
        let shard_id = self.shard_id();
        let Some(wire_name) = frame.t.as_deref() else {
            debug!(shard_id, "Dropping dispatch without event name");
            return;
        };
        if let Some(sequence) = frame.s {
            self.session.lock().record_sequence(sequence);
        }

        match wire_name {
            "READY" => {
                match frame.data::<ReadySession>() {
                    Ok(ready) => {
                        let mut session = self.session.lock();
                        session.session_id = Some(ready.session_id);
                        session.resume_url = ready.resume_gateway_url;
                    }
                    Err(e) => warn!(shard_id, error = %e, "READY without a usable session"),
                }
                self.mark_ready(handshake);
            }
            "RESUMED" => {
                info!(shard_id, "Session resumed");
                self.mark_ready(handshake);
            }
            _ => {}
        }

        let Some(name) = self.tracked.resolve(wire_name) else {
            trace!(shard_id, event = %wire_name, "Dropping untracked event");
            return;
        };

        let raw = frame.data_bytes().to_vec();
        let envelope = EventEnvelope::new(name, shard_id, frame.s.unwrap_or_default(), raw);
        if self.events.send(envelope).await.is_err() {
            debug!(shard_id, event = %name, "Event queue closed, dropping event");
        }
    }

    fn mark_ready(&self, handshake: &mut Option<oneshot::Sender<GatewayResult<()>>>) {
        self.set_state(ConnectionState::Connected);
        self.ready.send_replace(true);
        if let Some(tx) = handshake.take() {
            let _ = tx.send(Ok(()));
        }
    }

    fn handle_close(&self, frame: Option<CloseFrame<'static>>) -> SessionEnd {
        let shard_id = self.shard_id();
        let code = frame.as_ref().map(|f| u16::from(f.code));
        let reason = frame.map(|f| f.reason.into_owned()).unwrap_or_default();

        match code.and_then(CloseCode::from_u16) {
            Some(code) if !code.should_reconnect() => {
                SessionEnd::Fatal(GatewayError::FatalClose { shard_id, code })
            }
            Some(code) => {
                warn!(shard_id, %code, reason = %reason, "Gateway closed the connection");
                SessionEnd::Reconnect {
                    resume: !code.invalidates_session(),
                    delay: Duration::ZERO,
                    error: Some(GatewayError::ConnectionClosed { shard_id }),
                }
            }
            None => {
                warn!(shard_id, ?code, reason = %reason, "Websocket closed");
                SessionEnd::failed(GatewayError::ConnectionClosed { shard_id })
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("shard_id", &self.config.shard_id)
            .field("state", &self.state())
            .field("sequence", &self.session.lock().sequence)
            .finish()
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<Option<Disconnect>>) -> Disconnect {
    match shutdown.wait_for(Option::is_some).await {
        Ok(mode) => mode.unwrap_or(Disconnect::Close),
        Err(_) => Disconnect::Close,
    }
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code: WsCloseCode::from(code),
        reason: Cow::Borrowed(reason),
    }))
}

/// Wait for a bucket without giving up, regardless of cancel mode
///
/// Used for traffic the session depends on: identify, resume, heartbeats.
async fn wait_for_bucket(limiter: &RateLimiter, key: &str) {
    loop {
        let wait = match limiter.reserve(key) {
            Ok(wait) => wait,
            Err(RateLimitError::RateLimited { retry_after, .. }) => retry_after,
        };
        if wait.is_zero() {
            return;
        }
        debug!(key = %key, wait_ms = wait.as_millis() as u64, "Waiting for gateway bucket");
        tokio::time::sleep(wait).await;
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    shard_id: u32,
) {
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!(shard_id, error = %e, "Websocket write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Send a heartbeat every `interval`, the first one after a random jitter
///
/// A tick that finds the previous heartbeat unacknowledged fires `zombie`
/// and stops.
async fn heartbeat_loop(conn: Arc<Connection>, interval: Duration, zombie: oneshot::Sender<()>) {
    let jitter = interval.mul_f64(rand::random::<f64>());
    let mut ticker = tokio::time::interval_at(Instant::now() + jitter, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if conn.session.lock().ack_pending {
            let _ = zombie.send(());
            return;
        }
        if let Err(e) = conn.send_heartbeat().await {
            debug!(shard_id = conn.shard_id(), error = %e, "Heartbeat task stopping");
            return;
        }
    }
}
