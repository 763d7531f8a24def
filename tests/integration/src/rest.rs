//! Mock REST API
//!
//! axum routes for the endpoints the client bootstraps and reads through.
//! `/channels/{id}` answers 429 on its first hit to exercise rate limit
//! handling. Every hit is counted by path.

use crate::fixtures::{channel, gateway_bot, guild, user, BOT_ID, BOT_NAME, BOT_TOKEN};
use crate::helpers::bind_test_listener;
use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct RestState {
    gateway_url: String,
    shards: u32,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl RestState {
    /// Count the hit; returns how many times `path` was hit before
    fn hit(&self, uri: &Uri) -> usize {
        let mut hits = self.hits.lock();
        let count = hits.entry(uri.path().to_string()).or_default();
        *count += 1;
        *count - 1
    }
}

/// REST server for one test
pub struct MockRest {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    state: RestState,
    _handle: JoinHandle<()>,
}

impl MockRest {
    /// Start the API; `/gateway/bot` points at `gateway_url`
    pub async fn start(gateway_url: &str, shards: u32) -> Result<Self> {
        let state = RestState {
            gateway_url: gateway_url.to_string(),
            shards,
            hits: Arc::new(Mutex::new(HashMap::new())),
        };

        let app = Router::new()
            .route("/users/@me", get(current_user))
            .route("/users/:user_id", get(get_user))
            .route("/gateway/bot", get(get_gateway_bot))
            .route("/guilds/:guild_id", get(get_guild))
            .route("/channels/:channel_id", get(get_channel))
            .with_state(state.clone());
        let (listener, addr) = bind_test_listener().await?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            addr,
            client,
            state,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Times `path` was requested
    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.lock().get(path).copied().unwrap_or(0)
    }

    /// Make a GET request with the bot token
    pub async fn get_auth(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .header("Authorization", format!("Bot {BOT_TOKEN}"))
            .send()
            .await?)
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bot {BOT_TOKEN}"))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "401: Unauthorized", "code": 0})),
    )
        .into_response()
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.parse().ok()
}

async fn current_user(State(state): State<RestState>, uri: Uri, headers: HeaderMap) -> Response {
    state.hit(&uri);
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(user(BOT_ID, BOT_NAME)).into_response()
}

async fn get_user(
    State(state): State<RestState>,
    uri: Uri,
    Path(user_id): Path<String>,
) -> Response {
    state.hit(&uri);
    match parse_id(&user_id) {
        Some(id) => Json(user(id, &format!("user{id}"))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_gateway_bot(State(state): State<RestState>, uri: Uri) -> Json<Value> {
    state.hit(&uri);
    Json(gateway_bot(&state.gateway_url, state.shards))
}

async fn get_guild(
    State(state): State<RestState>,
    uri: Uri,
    Path(guild_id): Path<String>,
) -> Response {
    state.hit(&uri);
    match parse_id(&guild_id) {
        Some(id) => Json(guild(id, &format!("guild{id}"))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_channel(
    State(state): State<RestState>,
    uri: Uri,
    Path(channel_id): Path<String>,
) -> Response {
    let previous = state.hit(&uri);
    let Some(id) = parse_id(&channel_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if previous == 0 {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [
                ("x-ratelimit-limit", "5"),
                ("x-ratelimit-remaining", "0"),
                ("x-ratelimit-reset-after", "0.2"),
            ],
            Json(json!({
                "message": "You are being rate limited.",
                "retry_after": 0.2,
                "global": false
            })),
        )
            .into_response();
    }
    Json(channel(id, 1)).into_response()
}
