//! Gateway integration tests
//!
//! A real client against the mock gateway and REST API.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use guildlink::{Client, ConnectionState, EventName, GatewayEvent, Listener, Snowflake};
use integration_tests::{
    guild, message, start_mocks, test_config, wait_until, BOT_ID, BOT_TOKEN, READY_GUILDS,
    SESSION_ID,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const LONG_HEARTBEAT_MS: u64 = 45_000;
const WAIT: Duration = Duration::from_secs(10);

fn ready_guilds() -> Vec<Snowflake> {
    READY_GUILDS.iter().copied().map(Snowflake::new).collect()
}

// ============================================================================
// Connect / Identify / Ready
// ============================================================================

#[tokio::test]
async fn test_connect_identifies_and_becomes_ready() {
    let (rest, gateway) = start_mocks(LONG_HEARTBEAT_MS, 0).await.unwrap();
    let client = Client::new(test_config(&rest)).unwrap();

    let (ready_tx, ready_rx) = oneshot::channel();
    client.ready(move |client| {
        let _ = ready_tx.send(client.connected_guilds());
    });
    client.connect().await.unwrap();

    let guilds = tokio::time::timeout(WAIT, ready_rx).await.unwrap().unwrap();
    assert_eq!(guilds, ready_guilds());
    assert_eq!(client.bot_id(), Some(Snowflake::new(BOT_ID)));
    assert_eq!(rest.hits("/users/@me"), 1);
    assert_eq!(rest.hits("/gateway/bot"), 1);

    let identifies = gateway.received_op(2);
    assert_eq!(identifies.len(), 1);
    let (connection, identify) = &identifies[0];
    assert_eq!(*connection, 0);
    assert_eq!(identify["d"]["token"], BOT_TOKEN);
    assert_eq!(identify["d"]["shard"], serde_json::json!([0, 1]));

    assert_eq!(client.shards().states(), vec![(0, ConnectionState::Connected)]);
    client.disconnect().await.unwrap();
    assert_eq!(client.shards().states(), vec![(0, ConnectionState::Closed)]);
}

#[tokio::test]
async fn test_second_connect_is_rejected() {
    let (rest, _gateway) = start_mocks(LONG_HEARTBEAT_MS, 0).await.unwrap();
    let client = Client::new(test_config(&rest)).unwrap();
    client.connect().await.unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, guildlink::ClientError::AlreadyConnected));
    client.disconnect().await.unwrap();
}

// ============================================================================
// Dispatch -> Cache -> Handler
// ============================================================================

#[tokio::test]
async fn test_dispatch_reaches_cache_and_handlers() {
    let (rest, gateway) = start_mocks(LONG_HEARTBEAT_MS, 0).await.unwrap();
    let client = Client::new(test_config(&rest)).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .on(
            EventName::MessageCreate,
            vec![Listener::handler(move |client: Client, event: Arc<GatewayEvent>| {
                let tx = tx.clone();
                async move {
                    if let GatewayEvent::MessageCreate(create) = &*event {
                        // The guild from the earlier dispatch is already cached
                        let cached = client.cache().guild(Snowflake::new(3)).is_some();
                        let _ = tx.send((create.message.content.clone(), cached));
                    }
                    Ok(())
                }
            })],
        )
        .unwrap();
    client.connect().await.unwrap();

    gateway.dispatch("GUILD_CREATE", guild(3, "three"));
    gateway.dispatch("MESSAGE_CREATE", message(50, 60, "hello there"));

    let (content, cached) = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(content, "hello there");
    assert!(cached);
    assert!(client.connected_guilds().contains(&Snowflake::new(3)));

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_untracked_events_are_not_delivered() {
    let (rest, gateway) = start_mocks(LONG_HEARTBEAT_MS, 0).await.unwrap();
    let mut config = test_config(&rest);
    config.activate_event_channels = true;
    let client = Client::new(config).unwrap();
    let mut typing = client.event_channel(EventName::TypingStart).unwrap();
    client.connect().await.unwrap();

    // MESSAGE_CREATE was never asked for, so only the typing event arrives
    gateway.dispatch("MESSAGE_CREATE", message(1, 2, "ignored"));
    gateway.dispatch(
        "TYPING_START",
        serde_json::json!({"channel_id": "2", "user_id": "7", "timestamp": 1}),
    );

    let event = tokio::time::timeout(WAIT, typing.recv()).await.unwrap().unwrap();
    assert_eq!(event.name(), EventName::TypingStart);
    assert!(!client.shards().tracked().is_tracked(EventName::MessageCreate));

    client.disconnect().await.unwrap();
}

// ============================================================================
// Heartbeat timeout -> Resume
// ============================================================================

#[tokio::test]
async fn test_missing_heartbeat_ack_resumes_session() {
    // The first connection never acks, the second one does
    let (rest, gateway) = start_mocks(250, 1).await.unwrap();
    let client = Client::new(test_config(&rest)).unwrap();
    client.connect().await.unwrap();

    assert!(wait_until(WAIT, || !gateway.received_op(6).is_empty()).await);
    let (connection, resume) = gateway.received_op(6)[0].clone();
    assert_eq!(connection, 1);
    assert_eq!(resume["d"]["session_id"], SESSION_ID);
    assert_eq!(resume["d"]["seq"], 1);
    assert_eq!(gateway.received_op(2).len(), 1);

    assert!(
        wait_until(WAIT, || {
            client.shards().states() == vec![(0, ConnectionState::Connected)]
        })
        .await
    );
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_suspend_then_connect_resumes() {
    let (rest, gateway) = start_mocks(LONG_HEARTBEAT_MS, 0).await.unwrap();
    let client = Client::new(test_config(&rest)).unwrap();
    client.connect().await.unwrap();

    client.suspend().await.unwrap();
    client.connect().await.unwrap();

    assert_eq!(gateway.connections(), 2);
    assert_eq!(gateway.received_op(2).len(), 1);
    let resumes = gateway.received_op(6);
    assert_eq!(resumes.len(), 1);
    assert_eq!(resumes[0].0, 1);
    // Bootstrap ran once
    assert_eq!(rest.hits("/users/@me"), 1);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_fresh_connect_rebuilds_cache() {
    let (rest, gateway) = start_mocks(LONG_HEARTBEAT_MS, 0).await.unwrap();
    let client = Client::new(test_config(&rest)).unwrap();
    let guild_name = |client: &Client| client.cache().guild(Snowflake::new(3)).map(|g| g.name);

    client.connect().await.unwrap();
    gateway.dispatch("GUILD_CREATE", guild(3, "three"));
    assert!(wait_until(WAIT, || guild_name(&client).as_deref() == Some("three")).await);

    client.disconnect().await.unwrap();
    client.connect().await.unwrap();
    assert_eq!(gateway.received_op(2).len(), 2);
    assert!(gateway.received_op(6).is_empty());

    gateway.dispatch("GUILD_CREATE", guild(3, "renamed"));
    assert!(wait_until(WAIT, || guild_name(&client).as_deref() == Some("renamed")).await);

    client.disconnect().await.unwrap();
}
