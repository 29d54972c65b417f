//! `fintrack serve` — Start the HTTP API server.

use fintrack_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("💳 FinTrack API");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.default_provider, fintrack_providers::router::resolve_model(&config));
    println!("   Store:     {}", config.store.backend);

    fintrack_gateway::start(config).await?;

    Ok(())
}
