//! REST integration tests
//!
//! Read-through and rate limit handling against the mock API.
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use guildlink::{Client, ClientConfig, ClientError, Snowflake};
use guildlink_http::HttpError;
use integration_tests::{test_config, MockRest};
use reqwest::StatusCode;
use std::time::{Duration, Instant};

async fn start_rest() -> MockRest {
    MockRest::start("ws://127.0.0.1:9/gateway", 1).await.unwrap()
}

// ============================================================================
// Mock sanity
// ============================================================================

#[tokio::test]
async fn test_mock_requires_bot_token() {
    let rest = start_rest().await;
    let response = rest.get_auth("/users/@me").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = rest
        .client
        .get(format!("{}/users/@me", rest.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Read-through
// ============================================================================

#[tokio::test]
async fn test_guild_read_through_hits_rest_once() {
    let rest = start_rest().await;
    let client = Client::new(test_config(&rest)).unwrap();

    let first = client.get_guild(Snowflake::new(5)).await.unwrap();
    let second = client.get_guild(Snowflake::new(5)).await.unwrap();

    assert_eq!(first.name, "guild5");
    assert_eq!(first, second);
    assert_eq!(rest.hits("/guilds/5"), 1);

    // Roles arrived with the guild
    let roles = client.get_guild_roles(Snowflake::new(5)).await.unwrap();
    assert_eq!(roles.len(), 1);
}

#[tokio::test]
async fn test_user_read_through() {
    let rest = start_rest().await;
    let client = Client::new(test_config(&rest)).unwrap();

    let user = client.get_user(Snowflake::new(42)).await.unwrap();
    assert_eq!(user.username, "user42");
    client.get_user(Snowflake::new(42)).await.unwrap();
    assert_eq!(rest.hits("/users/42"), 1);
}

#[tokio::test]
async fn test_wrong_token_surfaces_status() {
    let rest = start_rest().await;
    let client = Client::new(test_config(&rest)).unwrap();
    let stranger = Client::new(ClientConfig::new("wrong").with_api_url(rest.base_url())).unwrap();

    let err = stranger.get_current_user().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Http(HttpError::Status { status: 401, .. })
    ));
    // A valid client still works against the same server
    assert_eq!(client.get_current_user().await.unwrap().username, "probe-bot");
}

// ============================================================================
// 429 handling
// ============================================================================

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let rest = start_rest().await;
    let client = Client::new(test_config(&rest)).unwrap();

    let started = Instant::now();
    let channel = client.get_channel(Snowflake::new(9)).await.unwrap();

    assert_eq!(channel.id, Snowflake::new(9));
    assert_eq!(rest.hits("/channels/9"), 2);
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_rate_limit_cancels_when_configured() {
    let rest = start_rest().await;
    let client = Client::new(test_config(&rest).with_cancel_on_rate_limit(true)).unwrap();

    let err = client.get_channel(Snowflake::new(9)).await.unwrap_err();
    assert!(matches!(err, ClientError::Http(HttpError::RateLimited(_))));
    assert_eq!(rest.hits("/channels/9"), 1);
}
