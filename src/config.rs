//! Client configuration for grid sessions.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 1247;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_SLEEP_MS: u64 = 1000;
pub const DEFAULT_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Zone whose namespace this client operates in; anchors the protected
    /// base directories (`/<zone>/home`, `/<zone>/trash`).
    pub zone: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_sleep_ms")]
    pub retry_sleep_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_port() -> u16 { DEFAULT_PORT }
fn default_max_retries() -> u32 { DEFAULT_MAX_RETRIES }
fn default_retry_sleep_ms() -> u64 { DEFAULT_RETRY_SLEEP_MS }
fn default_page_size() -> u32 { DEFAULT_PAGE_SIZE }

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            zone: "zone".into(),
            username: String::new(),
            password: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_sleep_ms: DEFAULT_RETRY_SLEEP_MS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl GridConfig {
    pub fn retry_sleep(&self) -> Duration {
        Duration::from_millis(self.retry_sleep_ms)
    }

    /// Parse a JSON config document; absent optional fields take defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
