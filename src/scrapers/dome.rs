//! DomeAPI Integration
//! Pilot in Command: Market Data Acquisition
//! Mission: Extract real-time cross-platform arbitrage opportunities

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

const DOME_API_BASE: &str = "https://api.domeapi.io";
const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomeMarketPrice {
    pub token_id: String,
    pub price: f64,
    pub volume_24h: f64,
    pub liquidity: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomeMatchingMarket {
    pub polymarket_slug: String,
    pub kalshi_ticker: Option<String>,
    pub polymarket_price: f64,
    pub kalshi_price: Option<f64>,
    pub arbitrage_opportunity: Option<ArbitrageSignal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageSignal {
    pub spread: f64,
    pub direction: ArbitrageDirection,
    pub estimated_profit: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArbitrageDirection {
    BuyPolymarketSellKalshi,
    BuyKalshiSellPolymarket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomeWalletAnalytics {
    pub wallet_address: String,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub recent_trades: Vec<DomeTrade>,
    pub whale_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomeTrade {
    pub market_id: String,
    pub side: String,
    pub size: f64,
    pub price: f64,
    pub timestamp: i64,
}

pub struct DomeScraper {
    client: Client,
    api_key: String,
    rate_limit_remaining: u32,
}

impl DomeScraper {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            rate_limit_remaining: 1000,
        }
    }

    /// Fetch real-time market price from Polymarket via DomeAPI
    pub async fn get_market_price(&mut self, token_id: &str) -> Result<DomeMarketPrice> {
        let url = format!("{}/polymarket/markets/price", DOME_API_BASE);
        let api_key = self.api_key.clone();
        let client = self.client.clone();

        let response = self
            .execute_with_retry(|| {
                let url = url.clone();
                let api_key = api_key.clone();
                let client = client.clone();
                let token_id = token_id.to_string();
                async move {
                    client
                        .get(&url)
                        .header("Authorization", format!("Bearer {}", api_key))
                        .query(&[("token_id", token_id)])
                        .send()
                        .await
                }
            })
            .await
            .context("Failed to fetch market price from DomeAPI")?;

        let price_data: DomeMarketPrice = response
            .json()
            .await
            .context("Failed to parse DomeAPI market price response")?;

        Ok(price_data)
    }

    /// Find matching markets across platforms for arbitrage
    pub async fn get_matching_markets(
        &mut self,
        polymarket_slug: &str,
    ) -> Result<DomeMatchingMarket> {
        let url = format!("{}/matching/markets/sports", DOME_API_BASE);
        let api_key = self.api_key.clone();
        let client = self.client.clone();

        let response = self
            .execute_with_retry(|| {
                let url = url.clone();
                let api_key = api_key.clone();
                let client = client.clone();
                let polymarket_slug = polymarket_slug.to_string();
                async move {
                    client
                        .get(&url)
                        .header("Authorization", format!("Bearer {}", api_key))
                        .header("X-API-Key", &api_key)
                        .query(&[("polymarket_slug", polymarket_slug)])
                        .send()
                        .await
                }
            })
            .await
            .context("Failed to fetch matching markets from DomeAPI")?;

        let matching_data: DomeMatchingMarket = response
            .json()
            .await
            .context("Failed to parse DomeAPI matching markets response")?;

        Ok(matching_data)
    }

    /// Get wallet analytics for whale tracking
    pub async fn get_wallet_analytics(
        &mut self,
        wallet_address: &str,
    ) -> Result<DomeWalletAnalytics> {
        let url = format!("{}/analytics/wallet", DOME_API_BASE);
        let api_key = self.api_key.clone();
        let client = self.client.clone();

        let response = self
            .execute_with_retry(|| {
                let url = url.clone();
                let api_key = api_key.clone();
                let client = client.clone();
                let wallet_address = wallet_address.to_string();
                async move {
                    client
                        .get(&url)
                        .header("Authorization", format!("Bearer {}", api_key))
                        .query(&[("address", wallet_address)])
                        .send()
                        .await
                }
            })
            .await
            .context("Failed to fetch wallet analytics from DomeAPI")?;

        let analytics: DomeWalletAnalytics = response
            .json()
            .await
            .context("Failed to parse DomeAPI wallet analytics response")?;

        Ok(analytics)
    }

    /// Get historical candlestick data
    pub async fn get_candlestick_data(
        &mut self,
        token_id: &str,
        interval: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<CandlestickData>> {
        let url = format!("{}/polymarket/markets/candles", DOME_API_BASE);
        let api_key = self.api_key.clone();
        let client = self.client.clone();

        let response = self
            .execute_with_retry(|| {
                let url = url.clone();
                let api_key = api_key.clone();
                let client = client.clone();
                let token_id = token_id.to_string();
                let interval = interval.to_string();
                let start_time_str = start_time.to_string();
                let end_time_str = end_time.to_string();
                async move {
                    client
                        .get(&url)
                        .header("Authorization", format!("Bearer {}", api_key))
                        .header("X-API-Key", &api_key)
                        .query(&[
                            ("token_id", token_id),
                            ("interval", interval),
                            ("start", start_time_str),
                            ("end", end_time_str),
                        ])
                        .send()
                        .await
                }
            })
            .await
            .context("Failed to fetch candlestick data from DomeAPI")?;

        let candles: Vec<CandlestickData> = response
            .json()
            .await
            .context("Failed to parse DomeAPI candlestick response")?;

        Ok(candles)
    }

    /// Execute request with exponential backoff retry
    async fn execute_with_retry<F, Fut>(&mut self, request_fn: F) -> Result<reqwest::Response>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = reqwest::Result<reqwest::Response>>,
    {
        let mut backoff = INITIAL_BACKOFF_MS;

        for attempt in 0..MAX_RETRIES {
            match timeout(Duration::from_secs(10), request_fn()).await {
                Ok(Ok(response)) => {
                    // Check rate limits
                    if let Some(remaining) = response
                        .headers()
                        .get("X-RateLimit-Remaining")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u32>().ok())
                    {
                        self.rate_limit_remaining = remaining;
                        if remaining < 10 {
                            warn!("DomeAPI rate limit low: {} requests remaining", remaining);
                        }
                    }

                    if response.status().is_success() {
                        return Ok(response);
                    } else if response.status().as_u16() == 429 {
                        error!("DomeAPI rate limit exceeded, backing off");
                        sleep(Duration::from_millis(backoff * 10)).await;
                    } else {
                        error!("DomeAPI error: {}", response.status());
                        return Err(anyhow::anyhow!("API error: {}", response.status()));
                    }
                }
                Ok(Err(e)) => {
                    warn!("DomeAPI request failed (attempt {}): {}", attempt + 1, e);
                }
                Err(_) => {
                    warn!("DomeAPI request timeout (attempt {})", attempt + 1);
                }
            }

            if attempt < MAX_RETRIES - 1 {
                info!("Retrying DomeAPI request in {}ms", backoff);
                sleep(Duration::from_millis(backoff)).await;
                backoff = (backoff * 2).min(30000); // Cap at 30 seconds
            }
        }

        Err(anyhow::anyhow!("Max retries exceeded for DomeAPI request"))
    }

    /// Detect cross-platform arbitrage opportunities
    pub async fn scan_arbitrage_opportunities(
        &mut self,
        min_spread_pct: f64,
    ) -> Result<Vec<ArbitrageOpportunity>> {
        info!("Scanning for cross-platform arbitrage opportunities");

        // This would typically fetch active markets and compare prices
        // Placeholder implementation
        let opportunities = Vec::new();

        Ok(opportunities)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandlestickData {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub polymarket_market: String,
    pub kalshi_market: Option<String>,
    pub spread_pct: f64,
    pub estimated_profit: f64,
    pub confidence: f64,
    pub detected_at: String,
}

/// Real-time WebSocket connection for live data
pub struct DomeWebSocket {
    api_key: String,
}

impl DomeWebSocket {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    pub async fn connect_live_feed(&self) -> Result<()> {
        // WebSocket implementation for real-time data
        // This would connect to wss://ws.domeapi.io and stream live prices
        info!("Connecting to DomeAPI WebSocket feed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dome_scraper() {
        let mut scraper = DomeScraper::new("test_api_key".to_string());
        // Add test cases
    }
}
