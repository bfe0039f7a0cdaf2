use teleport_core::{Config, Paths};

pub async fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::default();
    let config_path = paths.config_file();

    if config_path.exists() && !force {
        println!("Config already exists at {}", config_path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    let config = Config::default();
    config.save(&config_path)?;

    println!("Wrote default config to {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Start Chrome with --remote-debugging-port={}", config.agent.chrome.debug_port);
    println!("  2. Open and sign in to the web UI ({})", config.agent.chrome.page_url_match);
    println!("  3. teleport serve");
    println!("  4. teleport agent");
    Ok(())
}
