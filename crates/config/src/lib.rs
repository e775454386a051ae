use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "sokoni-client";
const KEYCHAIN_SERVICE: &str = "sokoni.marketplace.credentials";

/// Keychain entry holding the serialized session context.
pub const SESSION_SECRET_KEY: &str = "session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                kind: "mock".to_string(),
                base_url: None,
            },
            storage: StorageConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default = "default_api_kind")]
    pub kind: String, // "mock" | "http"
    pub base_url: Option<String>,
}

fn default_api_kind() -> String {
    "mock".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Directory for local sled databases (payments, offline cache) and
    /// the escrow audit log. Defaults to `.sokoni` in the working dir.
    pub data_dir: Option<String>,
}

impl StorageConfig {
    pub fn data_dir(&self) -> std::path::PathBuf {
        self.data_dir
            .as_deref()
            .unwrap_or(".sokoni")
            .into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub conversation_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            conversation_interval_secs: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    10
}

pub fn load() -> Result<AppConfig> {
    let cfg: AppConfig = confy::load(APP_NAME, None).context("Failed to load app config")?;
    Ok(cfg)
}

pub fn store(cfg: &AppConfig) -> Result<()> {
    confy::store(APP_NAME, None, cfg).context("Failed to store app config")?;
    Ok(())
}

/// Store a secret in the OS keychain
pub fn store_secret(key: &str, value: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

/// Retrieve a secret from the OS keychain
pub fn get_secret(key: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    let password = entry.get_password()?;
    Ok(password)
}

/// Delete a secret from the OS keychain
pub fn delete_secret(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.delete_password()?;
    Ok(())
}
