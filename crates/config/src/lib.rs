//! Configuration loading, validation, and management for FinTrack.
//!
//! Loads configuration from `~/.fintrack/config.toml` with environment
//! variable overrides. Validates all settings at startup; the document
//! encryption secret is checked separately by [`EncryptionConfig::secret_bytes`]
//! because a bad secret must stop the server but not the diagnostic commands.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Required length of the document encryption secret (AES-256).
pub const SECRET_KEY_LEN: usize = 32;

/// The root configuration structure.
///
/// Maps directly to `~/.fintrack/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Chat store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Document encryption configuration
    #[serde(default)]
    pub encryption: EncryptionConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .field("encryption", &self.encryption)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("key", &redact(&self.key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Upper bound on a request body, uploads included
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Allowed browser origins. Empty = same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_upload_bytes: default_max_upload_bytes(),
            cors_origins: vec!["http://localhost:5173".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database file. Defaults to `~/.fintrack/chats.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// Resolved database location.
    pub fn database_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| AppConfig::config_dir().join("chats.db"))
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Document encryption secret; exactly 32 bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl EncryptionConfig {
    /// The validated secret as raw key bytes.
    ///
    /// Absent or wrong-length secrets are fatal configuration errors.
    pub fn secret_bytes(&self) -> Result<[u8; SECRET_KEY_LEN], ConfigError> {
        let key = self.key.as_deref().ok_or_else(|| {
            ConfigError::ValidationError(
                "PDF_ENCRYPTION_KEY (or [encryption].key) must be set".into(),
            )
        })?;

        key.as_bytes().try_into().map_err(|_| {
            ConfigError::ValidationError(format!(
                "encryption key must be exactly {SECRET_KEY_LEN} bytes, got {}",
                key.len()
            ))
        })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.fintrack/config.toml).
    ///
    /// Environment variables take precedence over the file:
    /// - `FINTRACK_API_KEY`, then `GEMINI_API_KEY`, then `OPENAI_API_KEY`
    /// - `FINTRACK_PROVIDER`, `FINTRACK_MODEL`
    /// - `PDF_ENCRYPTION_KEY`
    /// - `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("FINTRACK_API_KEY")
            .or_else(|| lookup("GEMINI_API_KEY"))
            .or_else(|| lookup("OPENAI_API_KEY"))
        {
            self.api_key = Some(key);
        }

        if let Some(provider) = lookup("FINTRACK_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("FINTRACK_MODEL") {
            self.default_model = model;
        }

        if let Some(secret) = lookup("PDF_ENCRYPTION_KEY") {
            self.encryption.key = Some(secret);
        }

        if let Some(port) = lookup("PORT") {
            self.gateway.port = port
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("PORT is not a valid port: {port}")))?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".fintrack")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be \"sqlite\" or \"memory\", got \"{}\"",
                self.store.backend
            )));
        }

        if self.gateway.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_upload_bytes must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
            encryption: EncryptionConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.gateway.port, 5000);
        assert_eq!(config.store.backend, "sqlite");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_store_backend_rejected() {
        let mut config = AppConfig::default();
        config.store.backend = "firestore".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_provider, "gemini");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_provider = "openai"
default_model = "gpt-4o-mini"

[gateway]
port = 8088

[store]
backend = "memory"

[encryption]
key = "0123456789abcdef0123456789abcdef"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.gateway.port, 8088);
        assert_eq!(config.store.backend, "memory");
        assert!(config.encryption.secret_bytes().is_ok());
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = AppConfig::default();
        config.api_key = Some("from-file".into());
        config
            .apply_env_overrides(env_from(&[
                ("GEMINI_API_KEY", "from-env"),
                ("FINTRACK_MODEL", "gemini-1.5-pro"),
                ("PDF_ENCRYPTION_KEY", "abcdefghijklmnopqrstuvwxyz012345"),
                ("PORT", "7000"),
            ]))
            .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.default_model, "gemini-1.5-pro");
        assert_eq!(config.gateway.port, 7000);
        assert!(config.encryption.secret_bytes().is_ok());
    }

    #[test]
    fn fintrack_api_key_wins_over_vendor_keys() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env_from(&[
                ("OPENAI_API_KEY", "openai"),
                ("FINTRACK_API_KEY", "fintrack"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("fintrack"));
    }

    #[test]
    fn invalid_port_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(env_from(&[("PORT", "not-a-port")]));
        assert!(result.is_err());
    }

    #[test]
    fn missing_secret_is_fatal() {
        let config = AppConfig::default();
        let err = config.encryption.secret_bytes().unwrap_err();
        assert!(err.to_string().contains("PDF_ENCRYPTION_KEY"));
    }

    #[test]
    fn short_secret_is_fatal() {
        let encryption = EncryptionConfig {
            key: Some("too-short".into()),
        };
        let err = encryption.secret_bytes().unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn exact_secret_accepted() {
        let encryption = EncryptionConfig {
            key: Some("k".repeat(32)),
        };
        assert_eq!(encryption.secret_bytes().unwrap(), [b'k'; 32]);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-live-123".into());
        config.encryption.key = Some("s".repeat(32));
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-live-123"));
        assert!(!debug.contains(&"s".repeat(32)));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        assert!(toml_str.contains("5000"));
    }

    #[test]
    fn database_path_defaults_under_config_dir() {
        let store = StoreConfig::default();
        assert!(store.database_path().ends_with(".fintrack/chats.db"));
        let custom = StoreConfig {
            backend: "sqlite".into(),
            path: Some("/var/lib/fintrack/chats.db".into()),
        };
        assert_eq!(custom.database_path(), PathBuf::from("/var/lib/fintrack/chats.db"));
    }
}
