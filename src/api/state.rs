use anyhow::Result;

use crate::core::AppConfig;
use crate::openai::{UPSTREAM_READ_TIMEOUT, upstream_client};

/// Read-only state shared by every request. Nothing here is mutated
/// after startup so requests never coordinate with each other.
pub struct AppState {
    pub config: AppConfig,
    // Pooled client reused for upstream calls
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        Ok(Self {
            config,
            http: upstream_client(UPSTREAM_READ_TIMEOUT)?,
        })
    }
}
