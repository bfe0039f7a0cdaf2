use teleport_core::{Config, Paths};

pub async fn run(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let paths = Paths::default();
    let mut config = Config::load_or_default(&paths)?;

    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    teleport_relay::serve(&config).await?;
    Ok(())
}
