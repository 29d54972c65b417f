//! `fintrack status` — Show the effective configuration.

use fintrack_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("💳 FinTrack Status");
    println!("==================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", fintrack_providers::router::resolve_model(&config));
    println!("  Temperature:  {}", config.default_temperature);
    println!("  Max tokens:   {}", config.default_max_tokens);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  Upload limit: {} bytes", config.gateway.max_upload_bytes);
    println!("  CORS origins: {}", config.gateway.cors_origins.join(", "));
    match config.store.backend.as_str() {
        "sqlite" => println!(
            "  Store:        sqlite ({})",
            config.store.database_path().display()
        ),
        other => println!("  Store:        {other}"),
    }
    println!(
        "  Encryption:   {}",
        if config.encryption.key.is_some() { "key set" } else { "no key" }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `fintrack onboard` first");
    }

    Ok(())
}
