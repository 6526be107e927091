//! Hashdive Whale Tracker
//! Pilot in Command: Whale Detection
//! Mission: Track large market participants

use crate::models::{HashdiveWhale, WhaleTrade};
use anyhow::Result;
use reqwest::Client;
use tracing::info;

const HASHDIVE_API_BASE: &str = "https://hashdive.com/api";

pub struct HashdiveScraper {
    client: Client,
}

impl HashdiveScraper {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    pub async fn fetch_whale_data(&mut self) -> Result<Vec<HashdiveWhale>> {
        info!("Fetching whale data from Hashdive");

        // Placeholder - would implement actual API call
        Ok(Vec::new())
    }

    pub async fn fetch_recent_trades(&mut self) -> Result<Vec<WhaleTrade>> {
        info!("Fetching recent whale trades");

        // Placeholder
        Ok(Vec::new())
    }
}
