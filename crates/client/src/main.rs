//! apexkit-listen - print realtime events from an ApexKit backend
//!
//! Environment variables:
//! - `APEXKIT_API_URL`, `APEXKIT_TOKEN`, `APEXKIT_RECONNECT_MS`: see `ClientConfig`
//! - `APEXKIT_COLLECTION`: collection id to watch
//! - `APEXKIT_CHANNEL`: signal channel to watch (takes precedence)
//! - `APEXKIT_TRANSPORT`: `ws` (default) or `sse`

use anyhow::{bail, Context};
use apexkit_client::logging::init_tracing;
use apexkit_client::shared::{ServerEvent, SubscriptionFilter};
use apexkit_client::{ApiClient, ClientConfig};

fn print_event(event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!("Failed to encode event: {}", e),
    }
}

fn filter_from_env() -> anyhow::Result<SubscriptionFilter> {
    if let Ok(channel) = std::env::var("APEXKIT_CHANNEL") {
        return Ok(SubscriptionFilter::for_channel(channel));
    }
    match std::env::var("APEXKIT_COLLECTION") {
        Ok(raw) => {
            let id = raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("APEXKIT_COLLECTION must be a number, got {raw:?}"))?;
            Ok(SubscriptionFilter::for_collection(id))
        }
        Err(_) => bail!("set APEXKIT_CHANNEL or APEXKIT_COLLECTION"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("apexkit_client=info");

    let config = ClientConfig::from_env();
    let client = ApiClient::from_config(&config);
    let filter = filter_from_env()?;
    let transport = std::env::var("APEXKIT_TRANSPORT").unwrap_or_else(|_| "ws".to_string());

    tracing::info!("Listening on {} via {}", config.base_url, transport);

    match transport.as_str() {
        "sse" => {
            let sse = client.sse().with_retry(config.sse_retry);
            sse.on_event(print_event);
            sse.connect(filter.channel.as_deref(), filter.custom_event.as_deref());
            tokio::signal::ctrl_c().await?;
            sse.disconnect();
        }
        "ws" => {
            let realtime = client.realtime_with(&config);
            realtime.on_event(print_event);
            realtime.subscribe(filter);
            realtime.connect();
            tokio::signal::ctrl_c().await?;
            realtime.disconnect().await;
        }
        other => bail!("unknown APEXKIT_TRANSPORT {other:?}, expected ws or sse"),
    }

    Ok(())
}
