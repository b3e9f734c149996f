//! Per-symbol, per-interval strategy evaluation loop (§4.2 steps 1-4).

use crate::db::Pool;
use crate::domain::{Candle, SignalStatus, StrategySignal};
use crate::signals::store::SignalStore;
use crate::signals::strategy::Strategy;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::params;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub struct SignalEngineConfig {
    pub symbols: Vec<String>,
    pub interval: Duration,
    pub min_confidence: f64,
    pub expiry_hours: i64,
}

pub struct SignalEngine {
    config: SignalEngineConfig,
    strategies: Vec<Box<dyn Strategy>>,
    pool: Pool,
    store: Arc<SignalStore>,
}

impl SignalEngine {
    pub fn new(
        config: SignalEngineConfig,
        strategies: Vec<Box<dyn Strategy>>,
        pool: Pool,
        store: Arc<SignalStore>,
    ) -> Self {
        Self {
            config,
            strategies,
            pool,
            store,
        }
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            ticker.tick().await;
            // A single injected clock per tick, shared by every strategy
            // invocation this tick (§4.2 parity requirement).
            let tick_clock = Utc::now();
            for symbol in &self.config.symbols {
                if let Err(err) = self.evaluate_symbol(symbol, tick_clock).await {
                    warn!(symbol, error = %err, "signal evaluation failed");
                }
            }
        }
    }

    async fn load_candles(&self, symbol: &str, limit: usize) -> anyhow::Result<Vec<Candle>> {
        let conn = self.pool.get().await?;
        let mut stmt = conn.prepare(
            "SELECT symbol, timestamp, open, high, low, close, volume, vwap
             FROM candles WHERE symbol = ?1 ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let mut rows: Vec<Candle> = stmt
            .query_map(params![symbol, limit as i64], |row| {
                let ts: String = row.get(1)?;
                Ok(Candle {
                    symbol: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&ts)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                    vwap: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.reverse(); // ascending by time, as `analyze` expects
        Ok(rows)
    }

    async fn evaluate_symbol(&self, symbol: &str, tick_clock: DateTime<Utc>) -> anyhow::Result<()> {
        let max_required = self.strategies.iter().map(|s| s.required_bars()).max().unwrap_or(0);
        let candles = self.load_candles(symbol, max_required).await?;

        for strategy in &self.strategies {
            if candles.len() < strategy.required_bars() {
                continue;
            }
            let Some(output) = strategy.analyze(symbol, &candles) else {
                continue;
            };
            if output.confidence < self.config.min_confidence {
                continue;
            }

            let signal = StrategySignal {
                id: Uuid::new_v4(),
                symbol: symbol.to_string(),
                strategy_id: strategy.id().to_string(),
                signal_type: output.signal_type,
                confidence: output.confidence,
                entry_price: output.entry_price,
                stop_loss: output.stop_loss,
                take_profit: output.take_profit,
                reasoning: output.reasoning,
                generated_at: tick_clock,
                expires_at: tick_clock + ChronoDuration::hours(self.config.expiry_hours),
                status: SignalStatus::Pending,
                orchestration_run_id: None,
                indicators: output.indicators,
            };

            if !signal.has_valid_stop_and_targets() {
                warn!(symbol, strategy = strategy.id(), "dropping signal with invalid stop/target shape");
                continue;
            }

            self.store.insert(&signal).await?;
            crate::metrics::record_signal_generated(strategy.id(), signal.signal_type.as_lower());
            info!(
                symbol,
                strategy = strategy.id(),
                confidence = signal.confidence,
                "signal persisted"
            );
        }
        Ok(())
    }
}
