//! Persistence for `StrategySignal` rows, including the paginated list
//! query backing `GET /api/v1/signals`.

use crate::db::Pool;
use crate::domain::{SignalStatus, SignalType, StrategySignal};
use crate::errors::AppError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

pub struct SignalStore {
    pool: Pool,
}

#[derive(Debug, Default)]
pub struct SignalFilter {
    pub status: Option<SignalStatus>,
    pub symbol: Option<String>,
    pub strategy: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

fn status_str(status: SignalStatus) -> &'static str {
    match status {
        SignalStatus::Pending => "pending",
        SignalStatus::Approved => "approved",
        SignalStatus::Rejected => "rejected",
        SignalStatus::Expired => "expired",
        SignalStatus::Executed => "executed",
    }
}

fn status_from_str(s: &str) -> Result<SignalStatus, AppError> {
    match s {
        "pending" => Ok(SignalStatus::Pending),
        "approved" => Ok(SignalStatus::Approved),
        "rejected" => Ok(SignalStatus::Rejected),
        "expired" => Ok(SignalStatus::Expired),
        "executed" => Ok(SignalStatus::Executed),
        other => Err(AppError::Fatal(format!("unknown signal status {other}"))),
    }
}

fn type_str(t: SignalType) -> &'static str {
    match t {
        SignalType::Buy => "BUY",
        SignalType::Sell => "SELL",
        SignalType::Hold => "HOLD",
    }
}

fn type_from_str(s: &str) -> Result<SignalType, AppError> {
    match s {
        "BUY" => Ok(SignalType::Buy),
        "SELL" => Ok(SignalType::Sell),
        "HOLD" => Ok(SignalType::Hold),
        other => Err(AppError::Fatal(format!("unknown signal type {other}"))),
    }
}

fn row_to_signal(row: &Row) -> rusqlite::Result<StrategySignal> {
    let id: String = row.get("id")?;
    let take_profit_json: String = row.get("take_profit")?;
    let indicators_json: String = row.get("indicators")?;
    let status_raw: String = row.get("status")?;
    let type_raw: String = row.get("signal_type")?;
    let generated_at: String = row.get("generated_at")?;
    let expires_at: String = row.get("expires_at")?;
    let run_id: Option<String> = row.get("orchestration_run_id")?;

    Ok(StrategySignal {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        symbol: row.get("symbol")?,
        strategy_id: row.get("strategy_id")?,
        signal_type: type_from_str(&type_raw).unwrap_or(SignalType::Hold),
        confidence: row.get("confidence")?,
        entry_price: row.get("entry_price")?,
        stop_loss: row.get("stop_loss")?,
        take_profit: serde_json::from_str(&take_profit_json).unwrap_or_default(),
        reasoning: row.get("reasoning")?,
        generated_at: DateTime::parse_from_rfc3339(&generated_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        expires_at: DateTime::parse_from_rfc3339(&expires_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        status: status_from_str(&status_raw).unwrap_or(SignalStatus::Pending),
        orchestration_run_id: run_id.and_then(|s| Uuid::parse_str(&s).ok()),
        indicators: serde_json::from_str(&indicators_json).unwrap_or_default(),
    })
}

impl SignalStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, signal: &StrategySignal) -> Result<(), AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        conn.execute(
            "INSERT INTO strategy_signals
               (id, symbol, strategy_id, signal_type, confidence, entry_price, stop_loss,
                take_profit, reasoning, generated_at, expires_at, status, orchestration_run_id, indicators)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                signal.id.to_string(),
                signal.symbol,
                signal.strategy_id,
                type_str(signal.signal_type),
                signal.confidence,
                signal.entry_price,
                signal.stop_loss,
                serde_json::to_string(&signal.take_profit).unwrap_or_default(),
                signal.reasoning,
                signal.generated_at.to_rfc3339(),
                signal.expires_at.to_rfc3339(),
                status_str(signal.status),
                signal.orchestration_run_id.map(|u| u.to_string()),
                serde_json::to_string(&signal.indicators).unwrap_or_default(),
            ],
        )?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<StrategySignal>, AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        let result = conn
            .query_row(
                "SELECT * FROM strategy_signals WHERE id = ?1",
                params![id.to_string()],
                |row| row_to_signal(row),
            )
            .optional()?;
        Ok(result)
    }

    pub async fn update_status(&self, id: Uuid, status: SignalStatus) -> Result<(), AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        let changed = conn.execute(
            "UPDATE strategy_signals SET status = ?1 WHERE id = ?2",
            params![status_str(status), id.to_string()],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("signal {id}")));
        }
        Ok(())
    }

    /// Cursor-style pagination ordered by `(generated_at DESC, id)`, matching
    /// the lookup index.
    pub async fn list(&self, filter: &SignalFilter) -> Result<(Vec<StrategySignal>, u64), AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;

        let mut clauses = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            args.push(Box::new(status_str(status)));
        }
        if let Some(symbol) = &filter.symbol {
            clauses.push("symbol = ?");
            args.push(Box::new(symbol.to_uppercase()));
        }
        if let Some(strategy) = &filter.strategy {
            clauses.push("strategy_id = ?");
            args.push(Box::new(strategy.clone()));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM strategy_signals {where_clause}");
        let total: i64 = conn.query_row(
            &count_sql,
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |row| row.get(0),
        )?;

        let list_sql = format!(
            "SELECT * FROM strategy_signals {where_clause} ORDER BY generated_at DESC, id LIMIT ?{} OFFSET ?{}",
            args.len() + 1,
            args.len() + 2
        );
        args.push(Box::new(filter.limit as i64));
        args.push(Box::new(filter.offset as i64));

        let mut stmt = conn.prepare(&list_sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())), row_to_signal)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, total.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PoolConfig;

    async fn test_store() -> SignalStore {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let pool = Pool::new(tmp.path().to_str().unwrap().to_string(), PoolConfig::default()).unwrap();
        std::mem::forget(tmp); // keep file alive for pool lifetime in this test
        SignalStore::new(pool)
    }

    fn sample_signal() -> StrategySignal {
        StrategySignal {
            id: Uuid::new_v4(),
            symbol: "AAPL".into(),
            strategy_id: "sma_cross".into(),
            signal_type: SignalType::Buy,
            confidence: 0.75,
            entry_price: 150.0,
            stop_loss: 145.0,
            take_profit: vec![160.0],
            reasoning: "test".into(),
            generated_at: Utc::now(),
            expires_at: Utc::now(),
            status: SignalStatus::Pending,
            orchestration_run_id: None,
            indicators: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let store = test_store().await;
        let signal = sample_signal();
        store.insert(&signal).await.unwrap();
        let fetched = store.get(signal.id).await.unwrap().unwrap();
        assert_eq!(fetched.symbol, "AAPL");
        assert_eq!(fetched.signal_type, SignalType::Buy);
    }

    #[tokio::test]
    async fn list_filters_by_symbol_and_paginates() {
        let store = test_store().await;
        for i in 0..3 {
            let mut s = sample_signal();
            s.id = Uuid::new_v4();
            s.symbol = if i == 0 { "TSLA".into() } else { "AAPL".into() };
            store.insert(&s).await.unwrap();
        }
        let (rows, total) = store
            .list(&SignalFilter {
                symbol: Some("AAPL".into()),
                limit: 10,
                offset: 0,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);
    }
}
