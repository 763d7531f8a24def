//! Mock gateway
//!
//! An axum websocket route speaking enough of the gateway protocol for a
//! shard to identify, heartbeat and resume. Every frame a client sends is
//! recorded with the index of the connection it arrived on.

use crate::fixtures::{dispatch, heartbeat_ack, hello, ready};
use crate::helpers::bind_test_listener;
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Opcodes the mock reacts to
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RESUME: u64 = 6;

#[derive(Clone)]
struct GatewayState {
    heartbeat_interval: u64,
    /// Connections from this index on get heartbeat acks
    ack_from: usize,
    connections: Arc<AtomicUsize>,
    sequence: Arc<AtomicU64>,
    received: Arc<Mutex<Vec<(usize, Value)>>>,
    push: broadcast::Sender<Value>,
}

impl GatewayState {
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn reply_to(&self, connection: usize, frame: &Value) -> Option<Value> {
        match frame["op"].as_u64()? {
            OP_IDENTIFY => Some(dispatch("READY", self.next_sequence(), ready())),
            OP_RESUME => Some(dispatch("RESUMED", self.next_sequence(), json!({}))),
            OP_HEARTBEAT if connection >= self.ack_from => Some(heartbeat_ack()),
            _ => None,
        }
    }
}

/// Gateway server for one test
pub struct MockGateway {
    pub addr: SocketAddr,
    state: GatewayState,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Start a gateway asking for `heartbeat_ms` heartbeats; connections
    /// before `ack_from` never get an ack
    pub async fn start(heartbeat_ms: u64, ack_from: usize) -> Result<Self> {
        let state = GatewayState {
            heartbeat_interval: heartbeat_ms,
            ack_from,
            connections: Arc::new(AtomicUsize::new(0)),
            sequence: Arc::new(AtomicU64::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
            push: broadcast::channel(64).0,
        };

        let app = Router::new()
            .route("/gateway", get(upgrade))
            .with_state(state.clone());
        let (listener, addr) = bind_test_listener().await?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Every recorded frame as (connection index, frame)
    pub fn received(&self) -> Vec<(usize, Value)> {
        self.state.received.lock().clone()
    }

    /// Recorded frames with opcode `op`
    pub fn received_op(&self, op: u64) -> Vec<(usize, Value)> {
        self.received()
            .into_iter()
            .filter(|(_, frame)| frame["op"].as_u64() == Some(op))
            .collect()
    }

    /// Last sequence number handed out
    pub fn sequence(&self) -> u64 {
        self.state.sequence.load(Ordering::SeqCst)
    }

    /// Send a dispatch to every open connection
    pub fn dispatch(&self, event: &str, data: Value) {
        let frame = dispatch(event, self.state.next_sequence(), data);
        let _ = self.state.push.send(frame);
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(move |socket| serve(socket, state))
}

async fn serve(mut socket: WebSocket, state: GatewayState) {
    let connection = state.connections.fetch_add(1, Ordering::SeqCst);
    let mut pushed = state.push.subscribe();
    if send(&mut socket, &hello(state.heartbeat_interval)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            frame = socket.recv() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let reply = state.reply_to(connection, &frame);
                    state.received.lock().push((connection, frame));
                    if let Some(reply) = reply {
                        if send(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            frame = pushed.recv() => match frame {
                Ok(frame) => {
                    if send(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

async fn send(socket: &mut WebSocket, frame: &Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(frame.to_string())).await
}
