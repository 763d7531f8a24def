//! guildlink-probe: connects with the environment configuration and logs
//! what the gateway says until Ctrl-C.
//!
//! Run with:
//! ```bash
//! GUILDLINK_BOT_TOKEN=... cargo run -p guildlink --bin guildlink-probe
//! ```

use guildlink::{Client, ClientConfig, EventName, GatewayEvent, Listener};
use guildlink_common::try_init_tracing;
use std::time::Duration;
use tracing::{error, info};

const LATENCY_REPORT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Probe failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    let client = Client::new(config)?;
    client.on(
        EventName::Ready,
        vec![Listener::handler(|_client, event| async move {
            if let GatewayEvent::Ready(ready) = &*event {
                info!(
                    user = %ready.user.username,
                    session_id = %ready.session_id,
                    guilds = ready.guilds.len(),
                    "READY"
                );
            }
            Ok(())
        })],
    )?;
    client.ready(|client| {
        info!(guilds = client.connected_guilds().len(), "All shards ready");
    });

    client.connect().await?;

    let mut report = tokio::time::interval(LATENCY_REPORT_INTERVAL);
    report.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutting down");
                break;
            }
            _ = report.tick() => {
                info!(
                    latency_ms = client.heartbeat_latency().as_millis() as u64,
                    states = ?client.shards().states(),
                    "Heartbeat latency"
                );
            }
        }
    }

    client.disconnect().await?;
    Ok(())
}
