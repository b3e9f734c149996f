//! Market-data provider abstraction: `{GetQuote, GetCandles, StreamQuotes,
//! Health}`. Implementations are selected by ascending `priority`; a
//! `ProviderClient` falls back to the next provider on a retriable failure.

use crate::domain::{Candle, Quote};
use crate::errors::AppError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> u8;
    async fn get_quote(&self, symbol: &str) -> Result<Quote, AppError>;
    async fn get_candles(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Candle>, AppError>;
    async fn health(&self) -> Result<(), AppError>;
}

/// A provider backed by a REST market-data API. Classifies HTTP status into
/// `Transient` (429, 5xx — retriable) vs `Fatal` (4xx other than 429).
pub struct HttpMarketDataProvider {
    name: String,
    priority: u8,
    base_url: String,
    client: Client,
}

impl HttpMarketDataProvider {
    pub fn new(name: impl Into<String>, priority: u8, base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AppError::Fatal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            name: name.into(),
            priority,
            base_url: base_url.into(),
            client,
        })
    }

    fn classify(status: reqwest::StatusCode) -> AppError {
        if status.as_u16() == 429 || status.is_server_error() {
            AppError::Transient(format!("provider returned {status}"))
        } else {
            AppError::Fatal(format!("provider returned {status}"))
        }
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, AppError> {
        let url = format!("{}/quotes/{symbol}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("quote request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::classify(response.status()));
        }

        response
            .json::<Quote>()
            .await
            .map_err(|e| AppError::Fatal(format!("malformed quote payload: {e}")))
    }

    async fn get_candles(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Candle>, AppError> {
        let url = format!("{}/candles/{symbol}?days={lookback_days}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("candles request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::classify(response.status()));
        }

        response
            .json::<Vec<Candle>>()
            .await
            .map_err(|e| AppError::Fatal(format!("malformed candles payload: {e}")))
    }

    async fn health(&self) -> Result<(), AppError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("health check failed: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::classify(response.status()))
        }
    }
}

/// Selects providers in ascending priority order, falling back to the next
/// one when a call fails with a retriable (`Transient`) error.
pub struct ProviderClient {
    providers: Vec<Box<dyn MarketDataProvider>>,
}

impl ProviderClient {
    pub fn new(mut providers: Vec<Box<dyn MarketDataProvider>>) -> Self {
        providers.sort_by_key(|p| p.priority());
        Self { providers }
    }

    pub async fn get_quote(&self, symbol: &str) -> Result<Quote, AppError> {
        let mut last_err = AppError::Unavailable("no providers configured".into());
        for provider in &self.providers {
            match provider.get_quote(symbol).await {
                Ok(quote) => return Ok(quote),
                Err(AppError::Transient(msg)) => {
                    last_err = AppError::Transient(msg);
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_err)
    }

    pub async fn get_candles(&self, symbol: &str, lookback_days: u32) -> Result<Vec<Candle>, AppError> {
        let mut last_err = AppError::Unavailable("no providers configured".into());
        for provider in &self.providers {
            match provider.get_candles(symbol, lookback_days).await {
                Ok(candles) => return Ok(candles),
                Err(AppError::Transient(msg)) => {
                    last_err = AppError::Transient(msg);
                    continue;
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_err)
    }
}

pub fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
