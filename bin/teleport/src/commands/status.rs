use serde_json::Value;
use teleport_core::{Config, Paths};

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::default();
    let config = Config::load_or_default(&paths)?;
    let url = format!("http://{}:{}/health", config.gateway.host, config.gateway.port);

    let health: Value = match reqwest::get(&url).await {
        Ok(response) => response.json().await?,
        Err(e) => {
            println!("Relay unreachable at {}: {}", url, e);
            return Ok(());
        }
    };

    let connected = health["extensionConnected"].as_bool().unwrap_or(false);
    let inflight = health["inflightRequests"].as_u64().unwrap_or(0);

    println!("Relay:     ok ({})", url);
    println!("Extension: {}", if connected { "connected" } else { "not connected" });
    println!("In-flight: {}", inflight);
    Ok(())
}
