//! `fintrack doctor` — Diagnose configuration problems.

use fintrack_config::AppConfig;
use fintrack_security::SecretKey;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 FinTrack Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found");
    } else {
        println!("  ⚠️  No config file — defaults and environment only (`fintrack onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the configuration before running further checks.");
            return Ok(());
        }
    };

    match SecretKey::from_config(&config.encryption) {
        Ok(_) => println!("  ✅ Encryption key is 32 bytes"),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else if config.default_provider == "ollama" {
        println!("  ✅ Local provider, no API key needed");
    } else {
        println!("  ⚠️  No API key — set GEMINI_API_KEY or api_key in config.toml");
        issues += 1;
    }

    let router = fintrack_providers::router::build_from_config(&config);
    if router.default().is_some() {
        println!("  ✅ Provider '{}' available", router.default_name());
    } else {
        println!("  ❌ Provider '{}' is not known", config.default_provider);
        issues += 1;
    }

    match fintrack_store::open(&config.store).await {
        Ok(store) => println!("  ✅ Chat store '{}' opened", store.name()),
        Err(e) => {
            println!("  ❌ Chat store unavailable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
