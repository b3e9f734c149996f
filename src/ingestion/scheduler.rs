//! Polling loop (§4.1): one ticker fans out `GetQuote`/`GetCandles` per
//! configured symbol on each tick. Per-symbol failures are logged and
//! counted but never abort the batch.

use crate::db::Pool;
use crate::ingestion::cache::{TtlCache, CANDLE_TTL, QUOTE_TTL};
use crate::ingestion::provider::ProviderClient;
use crate::resilience::retry::{retry_with_backoff, RetryPolicy};
use rusqlite::params;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct IngestionScheduler {
    symbols: Vec<String>,
    poll_interval: Duration,
    provider: Arc<ProviderClient>,
    pool: Pool,
    retry_policy: RetryPolicy,
    quote_cache: TtlCache<crate::domain::Quote>,
    candle_cache: TtlCache<Vec<crate::domain::Candle>>,
}

impl IngestionScheduler {
    pub fn new(
        symbols: Vec<String>,
        poll_interval: Duration,
        provider: Arc<ProviderClient>,
        pool: Pool,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            symbols,
            poll_interval,
            provider,
            pool,
            retry_policy,
            quote_cache: TtlCache::new(),
            candle_cache: TtlCache::new(),
        }
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        for symbol in &self.symbols {
            match self.ingest_symbol(symbol).await {
                Ok(()) => crate::metrics::record_ingestion_tick(symbol, "ok"),
                Err(err) => {
                    warn!(symbol, error = %err, "ingestion tick failed for symbol");
                    crate::metrics::record_ingestion_tick(symbol, "error");
                }
            }
        }
    }

    async fn ingest_symbol(&self, symbol: &str) -> anyhow::Result<()> {
        let quote = match self.quote_cache.get("provider", "quote", symbol) {
            Some(q) => q,
            None => {
                let provider = self.provider.clone();
                let symbol_owned = symbol.to_string();
                let quote = retry_with_backoff(self.retry_policy, || {
                    let provider = provider.clone();
                    let symbol = symbol_owned.clone();
                    async move { provider.get_quote(&symbol).await }
                })
                .await?;
                self.quote_cache
                    .put("provider", "quote", symbol, quote.clone(), QUOTE_TTL);
                quote
            }
        };
        self.upsert_quote(&quote).await?;

        let candles = match self.candle_cache.get("provider", "candles_daily", symbol) {
            Some(c) => c,
            None => {
                let provider = self.provider.clone();
                let symbol_owned = symbol.to_string();
                let candles = retry_with_backoff(self.retry_policy, || {
                    let provider = provider.clone();
                    let symbol = symbol_owned.clone();
                    async move { provider.get_candles(&symbol, 30).await }
                })
                .await?;
                self.candle_cache
                    .put("provider", "candles_daily", symbol, candles.clone(), CANDLE_TTL);
                candles
            }
        };
        self.upsert_candles(&candles).await?;

        info!(symbol, candles = candles.len(), "ingestion tick ok");
        Ok(())
    }

    async fn upsert_quote(&self, quote: &crate::domain::Quote) -> anyhow::Result<()> {
        let conn = self.pool.get().await?;
        conn.execute(
            "INSERT INTO quotes (symbol, price, bid, ask, bid_size, ask_size, volume, timestamp, exchange)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(symbol) DO UPDATE SET
               price=excluded.price, bid=excluded.bid, ask=excluded.ask,
               bid_size=excluded.bid_size, ask_size=excluded.ask_size,
               volume=excluded.volume, timestamp=excluded.timestamp, exchange=excluded.exchange
             WHERE excluded.timestamp >= quotes.timestamp",
            params![
                quote.symbol,
                quote.price,
                quote.bid,
                quote.ask,
                quote.bid_size,
                quote.ask_size,
                quote.volume,
                quote.timestamp.to_rfc3339(),
                quote.exchange,
            ],
        )?;
        Ok(())
    }

    /// `(symbol, timestamp)` unique key, latest-wins upsert: a later tick can
    /// never commit an older candle over a newer one (§5 ordering guarantee).
    async fn upsert_candles(&self, candles: &[crate::domain::Candle]) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction()?;
        for candle in candles {
            tx.execute(
                "INSERT INTO candles (symbol, timestamp, open, high, low, close, volume, vwap)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(symbol, timestamp) DO NOTHING",
                params![
                    candle.symbol,
                    candle.timestamp.to_rfc3339(),
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume,
                    candle.vwap,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
