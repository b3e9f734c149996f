//! The seven-stage orchestration pipeline (§4.3).

use crate::db::Pool;
use crate::domain::{
    MemoryItem, MemorySource, OrchestrationRun, RunStatus, StrategySignal, ToolRun, TriggerType,
};
use crate::errors::AppError;
use crate::flow::FlowId;
use crate::orchestration::memory_client::MemoryClient;
use crate::orchestration::planner_client::{PlanRequest, PlannerAction, PlannerClient};
use crate::orchestration::tools::{self, ToolRunner};
use crate::signals::SignalStore;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_RUN_DEADLINE: Duration = Duration::from_secs(30);
const MAX_RECALLED_MEMORIES: u32 = 20;

pub struct OrchestrationPipeline {
    pool: Pool,
    signal_store: Arc<SignalStore>,
    memory_client: Arc<MemoryClient>,
    planner_client: Arc<PlannerClient>,
    tool_runner: Arc<dyn ToolRunner>,
    run_deadline: Duration,
}

pub struct RunRequest {
    pub symbol: String,
    pub trigger_type: TriggerType,
    pub trigger_id: Option<String>,
    pub notes: Option<String>,
}

impl OrchestrationPipeline {
    pub fn new(
        pool: Pool,
        signal_store: Arc<SignalStore>,
        memory_client: Arc<MemoryClient>,
        planner_client: Arc<PlannerClient>,
        tool_runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            pool,
            signal_store,
            memory_client,
            planner_client,
            tool_runner,
            run_deadline: DEFAULT_RUN_DEADLINE,
        }
    }

    /// Stage 1 + synchronous bootstrap: creates the `running` row and
    /// returns its id immediately; the remaining stages execute in the
    /// background via `execute`.
    pub async fn start(&self, request: &RunRequest, flow_id: &FlowId) -> Result<Uuid, AppError> {
        if let Some(trigger_id) = &request.trigger_id {
            if self.in_flight_run_exists(trigger_id).await? {
                return Err(AppError::Conflict(format!(
                    "an orchestration run is already in flight for trigger {trigger_id}"
                )));
            }
        }

        let run = OrchestrationRun {
            id: Uuid::new_v4(),
            symbol: request.symbol.clone(),
            trigger_type: request.trigger_type,
            trigger_id: request.trigger_id.clone(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            agent_suggestion: None,
            confidence: None,
            reasoning: None,
            memories_recalled: None,
            tool_runs: None,
            agent_response: None,
            error: None,
        };
        self.persist_new_run(&run).await?;
        info!(flow_id = %flow_id, run_id = %run.id, symbol = %run.symbol, "orchestration run started");
        Ok(run.id)
    }

    async fn in_flight_run_exists(&self, trigger_id: &str) -> Result<bool, AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM orchestration_runs WHERE trigger_id = ?1 AND status = 'running'",
            params![trigger_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn persist_new_run(&self, run: &OrchestrationRun) -> Result<(), AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        conn.execute(
            "INSERT INTO orchestration_runs (id, symbol, trigger_type, trigger_id, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run.id.to_string(),
                run.symbol,
                trigger_type_str(run.trigger_type),
                run.trigger_id,
                run_status_str(run.status),
                run.started_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Stages 2-7, run with a whole-pipeline deadline. Intended to be spawned
    /// as a background task after `start` returns.
    pub async fn execute(&self, run_id: Uuid, request: RunRequest, flow_id: FlowId) {
        let notes = request.notes.clone();
        match tokio::time::timeout(self.run_deadline, self.run_stages(run_id, &request, notes)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(flow_id = %flow_id, run_id = %run_id, error = %err, "orchestration run failed");
                let _ = self.mark_failed(run_id, &err.to_string()).await;
            }
            Err(_) => {
                warn!(flow_id = %flow_id, run_id = %run_id, "orchestration run exceeded deadline");
                let _ = self.mark_failed(run_id, "context deadline exceeded").await;
            }
        }
    }

    async fn run_stages(&self, run_id: Uuid, request: &RunRequest, notes: Option<String>) -> Result<(), AppError> {
        // Stage 2: build context.
        let signal = match &request.trigger_id {
            Some(id) => Uuid::parse_str(id).ok().map(|uuid| self.signal_store.get(uuid)),
            None => None,
        };
        let signal: Option<StrategySignal> = match signal {
            Some(fut) => fut.await?,
            None => None,
        };
        let context = build_context(&request.symbol, signal.as_ref(), notes.as_deref());

        // Stage 3: recall experiences.
        let recalled = self
            .memory_client
            .recall(&["trade_decisions", "beliefs"], &request.symbol, MAX_RECALLED_MEMORIES)
            .await?;

        // Stage 4: plan.
        let plan = self
            .planner_client
            .suggest(&PlanRequest {
                symbol: &request.symbol,
                context: &context,
                recalled_memories: &recalled,
                constraints: serde_json::json!({}),
            })
            .await?;

        // Stage 5: execute tools.
        let tool_runs = tools::run_steps(self.tool_runner.as_ref(), &plan.steps).await;

        // Stage 6: retain decision.
        let action_str = planner_action_str(plan.action);
        let decision = MemoryItem {
            id: None,
            ts: Utc::now(),
            item_type: "decision".to_string(),
            symbol: Some(request.symbol.clone()),
            tags: crate::domain::normalize_tags(
                signal
                    .as_ref()
                    .map(|s| s.strategy_id.clone())
                    .into_iter()
                    .chain(std::iter::once(action_str.to_string())),
            ),
            summary: plan.summary.clone(),
            data: serde_json::json!({
                "confidence": plan.confidence,
                "reasoningNotes": plan.reasoning_notes,
                "toolRuns": tool_runs,
            }),
            source: MemorySource {
                system: "orchestrator".to_string(),
                reference: None,
            },
        };
        self.memory_client.retain("trade_decisions", &decision).await?;

        // Stage 7: persist run.
        self.mark_completed(run_id, &plan, &recalled, &tool_runs).await
    }

    async fn mark_completed(
        &self,
        run_id: Uuid,
        plan: &crate::orchestration::planner_client::PlanResponse,
        recalled: &[MemoryItem],
        tool_runs: &[ToolRun],
    ) -> Result<(), AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        let memory_ids: Vec<String> = recalled.iter().filter_map(|m| m.id.clone()).collect();
        conn.execute(
            "UPDATE orchestration_runs SET
               status = 'completed', completed_at = ?1, agent_suggestion = ?2, confidence = ?3,
               reasoning = ?4, memories_recalled = ?5, tool_runs = ?6
             WHERE id = ?7",
            params![
                Utc::now().to_rfc3339(),
                planner_action_str(plan.action),
                plan.confidence,
                plan.reasoning_notes,
                serde_json::to_string(&memory_ids).map_err(|e| AppError::Fatal(e.to_string()))?,
                serde_json::to_string(tool_runs).map_err(|e| AppError::Fatal(e.to_string()))?,
                run_id.to_string(),
            ],
        )?;
        crate::metrics::record_orchestration_run("completed");
        Ok(())
    }

    async fn mark_failed(&self, run_id: Uuid, error: &str) -> Result<(), AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        conn.execute(
            "UPDATE orchestration_runs SET status = 'failed', completed_at = ?1, error = ?2 WHERE id = ?3",
            params![Utc::now().to_rfc3339(), error, run_id.to_string()],
        )?;
        crate::metrics::record_orchestration_run("failed");
        Ok(())
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<Option<RunStatus>, AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM orchestration_runs WHERE id = ?1",
                params![run_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        status.map(|s| run_status_from_str(&s)).transpose()
    }
}

fn build_context(symbol: &str, signal: Option<&StrategySignal>, notes: Option<&str>) -> String {
    let mut parts = vec![format!("symbol={symbol}")];
    if let Some(signal) = signal {
        parts.push(format!("strategy={}", signal.strategy_id));
        parts.push(format!("confidence={:.2}", signal.confidence));
        parts.push(format!("entry={:.2}", signal.entry_price));
        parts.push(format!("stop={:.2}", signal.stop_loss));
        parts.push(format!("targets={:?}", signal.take_profit));
    }
    if let Some(notes) = notes {
        parts.push(format!("notes={notes}"));
    }
    parts.join("; ")
}

fn planner_action_str(action: PlannerAction) -> &'static str {
    match action {
        PlannerAction::Buy => "buy",
        PlannerAction::Sell => "sell",
        PlannerAction::Hold => "hold",
        PlannerAction::Skip => "skip",
    }
}

fn trigger_type_str(t: TriggerType) -> &'static str {
    match t {
        TriggerType::Signal => "signal",
        TriggerType::Manual => "manual",
        TriggerType::Scheduled => "scheduled",
    }
}

fn run_status_str(s: RunStatus) -> &'static str {
    match s {
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
    }
}

fn run_status_from_str(s: &str) -> Result<RunStatus, AppError> {
    match s {
        "running" => Ok(RunStatus::Running),
        "completed" => Ok(RunStatus::Completed),
        "failed" => Ok(RunStatus::Failed),
        other => Err(AppError::Fatal(format!("unknown run status {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_includes_signal_fields_when_present() {
        let signal = StrategySignal {
            id: Uuid::new_v4(),
            symbol: "AAPL".into(),
            strategy_id: "sma_cross".into(),
            signal_type: crate::domain::SignalType::Buy,
            confidence: 0.8,
            entry_price: 150.0,
            stop_loss: 145.0,
            take_profit: vec![160.0],
            reasoning: "test".into(),
            generated_at: Utc::now(),
            expires_at: Utc::now(),
            status: crate::domain::SignalStatus::Approved,
            orchestration_run_id: None,
            indicators: serde_json::Map::new(),
        };
        let context = build_context("AAPL", Some(&signal), Some("reviewer note"));
        assert!(context.contains("strategy=sma_cross"));
        assert!(context.contains("notes=reviewer note"));
    }

    #[test]
    fn context_without_signal_is_symbol_only() {
        let context = build_context("TSLA", None, None);
        assert_eq!(context, "symbol=TSLA");
    }
}
