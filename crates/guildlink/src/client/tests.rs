use super::*;
use crate::ChannelError;
use async_trait::async_trait;
use guildlink_core::events::MessageCreate;
use guildlink_http::{HttpError, HttpResult, Request, Response};
use serde_json::json;
use std::collections::HashMap;

/// REST stand-in answering known endpoints and recording every call
#[derive(Default)]
struct Routes {
    bodies: HashMap<String, Value>,
    calls: Mutex<Vec<String>>,
}

impl Routes {
    fn with(mut self, endpoint: &str, body: Value) -> Self {
        self.bodies.insert(endpoint.to_string(), body);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Requester for Routes {
    async fn execute(&self, request: Request) -> HttpResult<Response> {
        self.calls.lock().push(request.endpoint.clone());
        match self.bodies.get(&request.endpoint) {
            Some(body) => Ok(Response {
                status: 200,
                body: serde_json::to_vec(body).unwrap(),
            }),
            None => Err(HttpError::Status {
                method: request.method.as_str(),
                endpoint: request.endpoint,
                status: 404,
                body: String::new(),
            }),
        }
    }
}

fn config() -> ClientConfig {
    ClientConfig::new("token")
        .with_gateway_url("ws://127.0.0.1:9")
        .with_shard_count(1)
}

fn client_with(routes: Routes) -> (Client, Arc<Routes>) {
    let routes = Arc::new(routes);
    let client = Client::with_requester(config(), Arc::clone(&routes) as Arc<dyn Requester>)
        .unwrap();
    (client, routes)
}

/// Prepare shard 0 without opening it
fn prepared(client: &Client) {
    let config = ManagerConfig::from_client_config(client.config(), String::from("ws://127.0.0.1:9"), 1);
    client.shards().prepare(&config);
}

fn envelope(name: EventName, sequence: u64, data: Value) -> EventEnvelope {
    EventEnvelope::new(name, 0, sequence, serde_json::to_vec(&data).unwrap())
}

#[test]
fn test_rejects_invalid_config() {
    let err = Client::with_requester(ClientConfig::new(""), Arc::new(Routes::default())).unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));
}

#[tokio::test]
async fn test_guild_read_through() {
    let (client, routes) = client_with(
        Routes::default().with("/guilds/1", json!({"id": "1", "name": "one"})),
    );

    let first = client.get_guild(Snowflake::new(1)).await.unwrap();
    let second = client.get_guild(Snowflake::new(1)).await.unwrap();

    assert_eq!(first.name, "one");
    assert_eq!(first, second);
    assert_eq!(routes.calls(), vec!["/guilds/1".to_string()]);
}

#[tokio::test]
async fn test_read_through_errors_propagate() {
    let (client, _routes) = client_with(Routes::default());
    let err = client.get_user(Snowflake::new(5)).await.unwrap_err();
    assert!(matches!(err, ClientError::Http(ref e) if e.is_not_found()));
    assert!(client.cache().user(Snowflake::new(5)).is_none());
}

#[tokio::test]
async fn test_guild_create_feeds_cache_and_guild_list() {
    let (client, routes) = client_with(Routes::default());
    prepared(&client);

    client.process(envelope(
        EventName::Ready,
        1,
        json!({
            "v": 10,
            "user": {"id": "100", "username": "bot"},
            "guilds": [{"id": "1", "unavailable": true}, {"id": "2", "unavailable": true}],
            "session_id": "abc"
        }),
    ));
    assert_eq!(client.connected_guilds(), vec![Snowflake::new(1), Snowflake::new(2)]);

    client.process(envelope(
        EventName::GuildCreate,
        2,
        json!({
            "id": "3",
            "name": "three",
            "roles": [{"id": "30", "name": "everyone"}]
        }),
    ));
    client.process(envelope(
        EventName::GuildDelete,
        3,
        json!({"id": "1", "unavailable": false}),
    ));

    assert_eq!(client.connected_guilds(), vec![Snowflake::new(2), Snowflake::new(3)]);
    let roles = client.get_guild_roles(Snowflake::new(3)).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert!(routes.calls().is_empty());
}

#[tokio::test]
async fn test_process_triggers_handlers() {
    let (client, _routes) = client_with(Routes::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .on(
            EventName::MessageCreate,
            vec![Listener::handler(move |_client: Client, event: Arc<GatewayEvent>| {
                let tx = tx.clone();
                async move {
                    if let GatewayEvent::MessageCreate(MessageCreate { message }) = &*event {
                        let _ = tx.send(message.content.clone());
                    }
                    Ok(())
                }
            })],
        )
        .unwrap();

    client.process(envelope(
        EventName::MessageCreate,
        1,
        json!({"id": "7", "channel_id": "8", "content": "hello"}),
    ));
    // Undecodable payloads never reach handlers
    client.process(EventEnvelope::new(EventName::MessageCreate, 0, 2, b"not json".to_vec()));

    assert_eq!(rx.recv().await.unwrap(), "hello");
    let nothing = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(nothing.is_err());
}

#[test]
fn test_event_channel_requires_activation() {
    let (client, _routes) = client_with(Routes::default());
    let err = client.event_channel(EventName::Ready).unwrap_err();
    assert!(matches!(err, ClientError::Channel(ChannelError::Disabled)));
}

#[tokio::test]
async fn test_event_channel_receives_events() {
    let mut config = config();
    config.activate_event_channels = true;
    let client = Client::with_requester(config, Arc::new(Routes::default())).unwrap();
    let mut events = client.event_channel(EventName::TypingStart).unwrap();
    assert!(client.shards().tracked().is_tracked(EventName::TypingStart));

    client.process(envelope(
        EventName::TypingStart,
        1,
        json!({"channel_id": "4", "user_id": "5", "timestamp": 1}),
    ));

    let event = events.recv().await.unwrap();
    assert_eq!(event.name(), EventName::TypingStart);
}

#[tokio::test]
async fn test_connect_fails_on_bad_token() {
    let (client, routes) = client_with(Routes::default());
    let err = client.connect().await.unwrap_err();

    assert!(matches!(err, ClientError::Http(_)));
    assert_eq!(client.lifecycle(), Lifecycle::Idle);
    assert_eq!(client.bot_id(), None);
    assert_eq!(routes.calls(), vec!["/users/@me".to_string()]);
}

#[tokio::test]
async fn test_commands_are_validated_before_sending() {
    let (client, _routes) = client_with(Routes::default());
    let err = client
        .emit("HEARTBEAT", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Gateway(_)));
}
