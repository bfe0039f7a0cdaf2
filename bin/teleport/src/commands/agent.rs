use std::sync::Arc;

use teleport_agent::{AgentClient, CdpDriver, UiDriver};
use teleport_core::{Config, Paths};
use tokio::sync::broadcast;
use tracing::info;

pub async fn run(bridge_url: Option<String>) -> anyhow::Result<()> {
    let paths = Paths::default();
    let mut config = Config::load_or_default(&paths)?;

    if let Some(url) = bridge_url {
        config.agent.bridge_url = url;
    }

    let driver: Arc<dyn UiDriver> = Arc::new(CdpDriver::connect(&config.agent.chrome).await?);
    let client = Arc::new(AgentClient::new(config.agent, driver));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(client.run_loop(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    let _ = shutdown_tx.send(());
    handle.await?;

    Ok(())
}
