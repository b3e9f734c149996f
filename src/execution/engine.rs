//! Pre-trade validation and order submission (§4.5.a, §4.5.c).

use crate::artifacts::ArtifactStore;
use crate::db::Pool;
use crate::domain::{Direction, Risk, SignalStatus, StrategySignal, Trade};
use crate::errors::AppError;
use crate::execution::broker::{BrokerBridge, BrokerOrder, OrderType};
use crate::execution::sizing::{size_position, SizingInput};
use crate::signals::SignalStore;
use chrono::Utc;
use rusqlite::params;
use std::sync::Arc;
use uuid::Uuid;

pub struct ExecutionEngine {
    signal_store: Arc<SignalStore>,
    artifact_store: Arc<ArtifactStore>,
    broker: Arc<dyn BrokerBridge>,
    pool: Pool,
    risk_per_trade: f64,
    max_position_pct: f64,
    order_type: OrderType,
}

#[derive(Debug)]
pub struct ExecutionResult {
    pub trade_id: Uuid,
    pub order_id: String,
    pub message: String,
    pub trade: Trade,
}

impl ExecutionEngine {
    pub fn new(
        signal_store: Arc<SignalStore>,
        artifact_store: Arc<ArtifactStore>,
        broker: Arc<dyn BrokerBridge>,
        pool: Pool,
        risk_per_trade: f64,
        max_position_pct: f64,
        order_type: OrderType,
    ) -> Self {
        Self {
            signal_store,
            artifact_store,
            broker,
            pool,
            risk_per_trade,
            max_position_pct,
            order_type,
        }
    }

    pub async fn execute(&self, signal_id: Uuid, approver: &str) -> Result<ExecutionResult, AppError> {
        let signal = self
            .signal_store
            .get(signal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("signal {signal_id}")))?;

        if signal.status != SignalStatus::Approved {
            return Err(AppError::Conflict(format!(
                "signal {signal_id} is not approved (status {:?})",
                signal.status
            )));
        }
        if !signal.has_valid_stop_and_targets() {
            return Err(AppError::Validation("invalid stop loss".into()));
        }

        if !self.artifact_store.is_strategy_usable(&signal.strategy_id).await? {
            return Err(AppError::Conflict("artifact not approved".into()));
        }

        let account = self.broker.get_account().await?;

        let sizing = size_position(SizingInput {
            net_liquidation: account.net_liquidation,
            buying_power: account.buying_power,
            risk_per_trade: self.risk_per_trade,
            max_position_pct: self.max_position_pct,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
        })?;

        let direction = match signal.signal_type {
            crate::domain::SignalType::Buy => Direction::Buy,
            crate::domain::SignalType::Sell => Direction::Sell,
            crate::domain::SignalType::Hold => {
                return Err(AppError::Validation("cannot execute a HOLD signal".into()))
            }
        };

        let order = BrokerOrder {
            symbol: signal.symbol.clone(),
            direction,
            quantity: sizing.quantity,
            order_type: self.order_type,
            limit_price: matches!(self.order_type, OrderType::Lmt).then_some(signal.entry_price),
            time_in_force: "DAY".to_string(),
        };

        let ack = self.broker.place_order(&order).await?;

        let trade = Trade {
            id: Uuid::new_v4(),
            symbol: signal.symbol.clone(),
            direction,
            entry: signal.entry_price,
            stop: signal.stop_loss,
            targets: signal.take_profit.clone(),
            event_id: None,
            strategy_id: signal.strategy_id.clone(),
            notes: None,
            risk: Risk {
                amount: sizing.risk_amount,
                percent: self.risk_per_trade,
                position_value: sizing.position_value,
                quantity: sizing.quantity,
                order_id: ack.order_id.clone(),
                status: "pending".to_string(),
            },
            created_at: Utc::now(),
        };

        self.persist_trade(&trade, signal_id, approver).await?;
        self.signal_store.update_status(signal_id, SignalStatus::Executed).await?;
        crate::metrics::record_trade_submission("submitted");

        Ok(ExecutionResult {
            trade_id: trade.id,
            order_id: ack.order_id,
            message: "order submitted".to_string(),
            trade,
        })
    }

    async fn persist_trade(&self, trade: &Trade, signal_id: Uuid, approver: &str) -> Result<(), AppError> {
        let direction_str = match trade.direction {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        };
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        conn.execute(
            "INSERT INTO trades
               (id, symbol, direction, entry, stop, targets, event_id, strategy_id, notes,
                risk_amount, risk_percent, risk_position_value, risk_quantity, risk_order_id, risk_status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                trade.id.to_string(),
                trade.symbol,
                direction_str,
                trade.entry,
                trade.stop,
                serde_json::to_string(&trade.targets).map_err(|e| AppError::Fatal(e.to_string()))?,
                trade.event_id,
                trade.strategy_id,
                trade.notes,
                trade.risk.amount,
                trade.risk.percent,
                trade.risk.position_value,
                trade.risk.quantity,
                trade.risk.order_id,
                trade.risk.status,
                trade.created_at.to_rfc3339(),
            ],
        )?;

        conn.execute(
            "INSERT INTO trade_approvals (signal_id, orchestration_run_id, approved, approved_by, approved_at, order_id)
             VALUES (?1, NULL, 1, ?2, ?3, ?4)
             ON CONFLICT(signal_id) DO UPDATE SET order_id = excluded.order_id",
            params![
                signal_id.to_string(),
                approver,
                Utc::now().to_rfc3339(),
                trade.risk.order_id,
            ],
        )?;
        Ok(())
    }

    pub async fn list_recent_trades(&self, limit: u32) -> Result<Vec<Trade>, AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT id, symbol, direction, entry, stop, targets, event_id, strategy_id, notes,
                    risk_amount, risk_percent, risk_position_value, risk_quantity, risk_order_id, risk_status, created_at
             FROM trades ORDER BY created_at DESC, id LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let id: String = row.get(0)?;
                let direction: String = row.get(2)?;
                let targets: String = row.get(5)?;
                let created_at: String = row.get(15)?;
                Ok(Trade {
                    id: Uuid::parse_str(&id).unwrap_or_default(),
                    symbol: row.get(1)?,
                    direction: if direction == "BUY" { Direction::Buy } else { Direction::Sell },
                    entry: row.get(3)?,
                    stop: row.get(4)?,
                    targets: serde_json::from_str(&targets).unwrap_or_default(),
                    event_id: row.get(6)?,
                    strategy_id: row.get(7)?,
                    notes: row.get(8)?,
                    risk: Risk {
                        amount: row.get(9)?,
                        percent: row.get(10)?,
                        position_value: row.get(11)?,
                        quantity: row.get(12)?,
                        order_id: row.get(13)?,
                        status: row.get(14)?,
                    },
                    created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[allow(dead_code)]
fn _assert_strategy_signal_type(_: &StrategySignal) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactStore;
    use crate::db::PoolConfig;
    use crate::domain::{ApprovalState, Artifact, RiskProfile, SignalType, StrategyRef, ValidationInfo};
    use crate::execution::broker::{Account, OrderAck};
    use crate::signals::SignalStore;
    use async_trait::async_trait;

    struct MockBroker;

    #[async_trait]
    impl BrokerBridge for MockBroker {
        async fn get_account(&self) -> Result<Account, AppError> {
            Ok(Account {
                net_liquidation: 100_000.0,
                buying_power: 100_000.0,
                currency: "USD".into(),
            })
        }

        async fn place_order(&self, _order: &BrokerOrder) -> Result<OrderAck, AppError> {
            Ok(OrderAck {
                order_id: "test-order-1".into(),
            })
        }

        async fn health(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    async fn test_pool() -> (Pool, tempfile::NamedTempFile) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let pool = Pool::new(tmp.path().to_str().unwrap().to_string(), PoolConfig::default()).unwrap();
        (pool, tmp)
    }

    fn sample_signal(strategy_id: &str) -> StrategySignal {
        StrategySignal {
            id: Uuid::new_v4(),
            symbol: "AAPL".into(),
            strategy_id: strategy_id.into(),
            signal_type: SignalType::Buy,
            confidence: 0.75,
            entry_price: 150.0,
            stop_loss: 145.0,
            take_profit: vec![160.0],
            reasoning: "test".into(),
            generated_at: Utc::now(),
            expires_at: Utc::now(),
            status: SignalStatus::Approved,
            orchestration_run_id: None,
            indicators: serde_json::Map::new(),
        }
    }

    fn draft_artifact(strategy_name: &str) -> Artifact {
        let mut artifact = Artifact {
            id: Uuid::new_v4(),
            artifact_id: format!("{strategy_name}-2025-01-01T00:00:00Z"),
            schema_version: 1,
            strategy: StrategyRef {
                name: strategy_name.into(),
                version: "1.0.0".into(),
                code_ref: None,
                params: serde_json::Map::new(),
            },
            data_window: None,
            validation: None,
            risk_profile: RiskProfile {
                max_position_pct: 0.2,
                max_daily_loss: 0.05,
                allowed_order_types: vec!["LMT".into()],
            },
            hash: String::new(),
            signature: None,
            created_by: "system".into(),
            created_at: Utc::now(),
        };
        artifact.hash = crate::artifacts::canonical::compute_hash(&artifact).unwrap();
        artifact
    }

    /// Drives a freshly stored (`DRAFT`) artifact all the way to `APPROVED`,
    /// which is usable per the state machine.
    async fn approve_artifact(store: &ArtifactStore, artifact_id: &str) {
        store
            .attach_validation_report(
                artifact_id,
                &ValidationInfo {
                    backtest_run_id: None,
                    metrics: serde_json::Map::new(),
                    determinism_seed: None,
                    report_uri: None,
                },
                true,
            )
            .await
            .unwrap();
        store
            .transition(artifact_id, ApprovalState::Validated, "system", None, None, None, None)
            .await
            .unwrap();
        store
            .transition(
                artifact_id,
                ApprovalState::Reviewed,
                "system",
                None,
                Some("reviewer"),
                Some("looks good"),
                None,
            )
            .await
            .unwrap();
        store
            .transition(
                artifact_id,
                ApprovalState::Approved,
                "system",
                None,
                Some("reviewer"),
                Some("looks good"),
                Some("approver"),
            )
            .await
            .unwrap();
    }

    async fn engine_with_strategy_artifact(strategy_id: &str, approve: bool) -> (ExecutionEngine, Arc<SignalStore>, Pool) {
        let (pool, tmp) = test_pool().await;
        std::mem::forget(tmp);

        let signal_store = Arc::new(SignalStore::new(pool.clone()));
        let artifact_store = Arc::new(ArtifactStore::new(pool.clone()));

        let artifact = draft_artifact(strategy_id);
        artifact_store.store(&artifact).await.unwrap();
        if approve {
            approve_artifact(&artifact_store, &artifact.artifact_id).await;
        }

        let engine = ExecutionEngine::new(
            signal_store.clone(),
            artifact_store,
            Arc::new(MockBroker),
            pool.clone(),
            0.01,
            0.20,
            OrderType::Lmt,
        );
        (engine, signal_store, pool)
    }

    #[tokio::test]
    async fn execute_succeeds_when_artifact_is_approved() {
        let (engine, signal_store, _pool) = engine_with_strategy_artifact("sma_cross", true).await;
        let signal = sample_signal("sma_cross");
        signal_store.insert(&signal).await.unwrap();

        let result = engine.execute(signal.id, "approver").await.unwrap();
        assert_eq!(result.order_id, "test-order-1");

        let updated = signal_store.get(signal.id).await.unwrap().unwrap();
        assert_eq!(updated.status, SignalStatus::Executed);
    }

    #[tokio::test]
    async fn execute_rejects_when_artifact_is_not_approved() {
        let (engine, signal_store, _pool) = engine_with_strategy_artifact("sma_cross", false).await;
        let signal = sample_signal("sma_cross");
        signal_store.insert(&signal).await.unwrap();

        let err = engine.execute(signal.id, "approver").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn execute_rejects_when_no_artifact_is_registered_for_strategy() {
        let (engine, signal_store, _pool) = engine_with_strategy_artifact("sma_cross", true).await;
        let signal = sample_signal("rsi_reversion");
        signal_store.insert(&signal).await.unwrap();

        let err = engine.execute(signal.id, "approver").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
