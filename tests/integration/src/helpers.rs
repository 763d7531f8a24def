//! Test helpers
//!
//! Port allocation, client configuration for the mock servers and polling.

use crate::fixtures::BOT_TOKEN;
use crate::gateway::MockGateway;
use crate::rest::MockRest;
use anyhow::Result;
use guildlink::ClientConfig;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

/// Counter for unique test ports
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19400);

/// Get a unique port for testing
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Bind a listener on the next free test port
pub async fn bind_test_listener() -> Result<(TcpListener, SocketAddr)> {
    loop {
        let addr = SocketAddr::from(([127, 0, 0, 1], get_test_port()));
        if let Ok(listener) = TcpListener::bind(addr).await {
            let addr = listener.local_addr()?;
            return Ok((listener, addr));
        }
    }
}

/// Client configuration pointing at the mock servers
///
/// Gateway URL and shard count are left unset so `connect` asks
/// `/gateway/bot` for them.
pub fn test_config(rest: &MockRest) -> ClientConfig {
    ClientConfig::new(BOT_TOKEN)
        .with_api_url(rest.base_url())
        .with_http_timeout(Duration::from_secs(5))
        .with_identify_interval(Duration::from_millis(100))
}

/// Start both mock servers wired to each other
pub async fn start_mocks(heartbeat_ms: u64, ack_from: usize) -> Result<(MockRest, MockGateway)> {
    let gateway = MockGateway::start(heartbeat_ms, ack_from).await?;
    let rest = MockRest::start(&gateway.url(), 1).await?;
    Ok((rest, gateway))
}

/// Poll `condition` every 20ms until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
