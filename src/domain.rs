//! Canonical data model shared by every component (§3): quotes, candles,
//! observations, signals, artifacts, approvals, orchestration runs, trades,
//! audit events, and memory items. Replaces the teacher's Polymarket-shaped
//! `models.rs` with the domain this crate actually implements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
    pub exchange: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub vwap: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Earnings,
    NewsHeadline,
    UnusualVolume,
    PriceGap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "type")]
    pub kind: ObservationKind,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub impact_estimate: f64,
    pub confidence: f64,
    pub tags: Vec<String>,
    pub headline: Option<String>,
    pub volume_multiple: Option<f64>,
    pub gap_percent: Option<f64>,
    pub bookmarked: Option<bool>,
}

/// Which memory bank a normalized observation lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedBank {
    MarketEvents,
    Signals,
}

impl NormalizedBank {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizedBank::MarketEvents => "market_events",
            NormalizedBank::Signals => "signals",
        }
    }
}

/// Post-normalization canonical shape. Same struct services both the
/// `market_events` and `signals` banks; `bank` says which.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub symbol: String,
    pub tags: Vec<String>,
    pub summary: String,
    pub impact_estimate: f64,
    pub confidence: f64,
    pub source: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl SignalType {
    /// Internal lowercase representation used inside `analyze`.
    pub fn as_lower(&self) -> &'static str {
        match self {
            SignalType::Buy => "buy",
            SignalType::Sell => "sell",
            SignalType::Hold => "hold",
        }
    }

    pub fn from_lower(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(SignalType::Buy),
            "sell" => Some(SignalType::Sell),
            "hold" => Some(SignalType::Hold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Executed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySignal {
    pub id: Uuid,
    pub symbol: String,
    pub strategy_id: String,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Vec<f64>,
    pub reasoning: String,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SignalStatus,
    pub orchestration_run_id: Option<Uuid>,
    pub indicators: serde_json::Map<String, serde_json::Value>,
}

impl StrategySignal {
    /// §3 invariant: stop on the losing side of entry, targets on the
    /// winning side, for both directions.
    pub fn has_valid_stop_and_targets(&self) -> bool {
        let stop_ok = match self.signal_type {
            SignalType::Buy => self.stop_loss < self.entry_price,
            SignalType::Sell => self.stop_loss > self.entry_price,
            SignalType::Hold => true,
        };
        let targets_ok = self.take_profit.iter().all(|&t| match self.signal_type {
            SignalType::Buy => t > self.entry_price,
            SignalType::Sell => t < self.entry_price,
            SignalType::Hold => true,
        });
        stop_ok && targets_ok
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalState {
    Draft,
    Validated,
    Reviewed,
    Approved,
    Active,
    Deprecated,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRef {
    pub name: String,
    pub version: String,
    pub code_ref: Option<String>,
    pub params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationInfo {
    pub backtest_run_id: Option<Uuid>,
    pub metrics: serde_json::Map<String, serde_json::Value>,
    pub determinism_seed: Option<i64>,
    pub report_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskProfile {
    pub max_position_pct: f64,
    pub max_daily_loss: f64,
    pub allowed_order_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub artifact_id: String,
    pub schema_version: u32,
    pub strategy: StrategyRef,
    pub data_window: Option<DataWindow>,
    pub validation: Option<ValidationInfo>,
    pub risk_profile: RiskProfile,
    pub hash: String,
    /// Reserved for future signing; never a gating check (open question).
    pub signature: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: Uuid,
    pub artifact_id: String,
    pub state: ApprovalState,
    pub previous_state: Option<ApprovalState>,
    pub validation_passed: bool,
    pub validation_run_id: Option<Uuid>,
    pub reviewer: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub state_changed_by: String,
    pub state_changed_at: DateTime<Utc>,
    pub state_change_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    pub artifact_id: String,
    pub from_state: Option<ApprovalState>,
    pub to_state: ApprovalState,
    pub promoted_by: String,
    pub promoted_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub validation_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Signal,
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRun {
    pub name: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRun {
    pub id: Uuid,
    pub symbol: String,
    pub trigger_type: TriggerType,
    pub trigger_id: Option<String>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub agent_suggestion: Option<String>,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
    pub memories_recalled: Option<Vec<String>>,
    pub tool_runs: Option<Vec<ToolRun>>,
    pub agent_response: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeApproval {
    pub signal_id: Uuid,
    pub orchestration_run_id: Option<Uuid>,
    pub approved: bool,
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
    pub modification_notes: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub amount: f64,
    pub percent: f64,
    pub position_value: f64,
    pub quantity: u64,
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub targets: Vec<f64>,
    pub event_id: Option<String>,
    pub strategy_id: String,
    pub notes: Option<String>,
    pub risk: Risk,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Started,
    Success,
    Skipped,
    Rejected,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub correlation_id: String,
    pub action: String,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySource {
    pub system: String,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: Option<String>,
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub item_type: String,
    pub symbol: Option<String>,
    pub tags: Vec<String>,
    pub summary: String,
    pub data: serde_json::Value,
    pub source: MemorySource,
}

/// `trim -> lowercase -> drop empty -> dedupe`, capped at 10 (§8 invariant).
pub fn normalize_tags(tags: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let normalized = tag.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized.clone()) {
            out.push(normalized);
        }
        if out.len() == 10 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_tags_trims_lowercases_dedupes_and_caps() {
        let tags = vec![" Earnings ", "EARNINGS", "q4", "", "  ", "extra1", "extra2", "extra3", "extra4", "extra5", "extra6", "extra7"];
        let out = normalize_tags(tags);
        assert!(out.len() <= 10);
        assert_eq!(out[0], "earnings");
        assert!(out.iter().filter(|t| *t == "earnings").count() == 1);
    }

    #[test]
    fn buy_signal_requires_stop_below_and_targets_above_entry() {
        let signal = StrategySignal {
            id: Uuid::new_v4(),
            symbol: "AAPL".into(),
            strategy_id: "sma_cross".into(),
            signal_type: SignalType::Buy,
            confidence: 0.8,
            entry_price: 150.0,
            stop_loss: 145.0,
            take_profit: vec![160.0, 170.0],
            reasoning: "test".into(),
            generated_at: Utc::now(),
            expires_at: Utc::now(),
            status: SignalStatus::Pending,
            orchestration_run_id: None,
            indicators: serde_json::Map::new(),
        };
        assert!(signal.has_valid_stop_and_targets());
    }

    #[test]
    fn buy_signal_with_stop_above_entry_is_invalid() {
        let mut signal_type_buy_bad = StrategySignal {
            id: Uuid::new_v4(),
            symbol: "AAPL".into(),
            strategy_id: "sma_cross".into(),
            signal_type: SignalType::Buy,
            confidence: 0.8,
            entry_price: 150.0,
            stop_loss: 155.0,
            take_profit: vec![160.0],
            reasoning: "test".into(),
            generated_at: Utc::now(),
            expires_at: Utc::now(),
            status: SignalStatus::Pending,
            orchestration_run_id: None,
            indicators: serde_json::Map::new(),
        };
        assert!(!signal_type_buy_bad.has_valid_stop_and_targets());
        signal_type_buy_bad.stop_loss = 145.0;
        assert!(signal_type_buy_bad.has_valid_stop_and_targets());
    }

    #[test]
    fn signal_type_round_trips_through_lowercase() {
        for t in [SignalType::Buy, SignalType::Sell, SignalType::Hold] {
            let lower = t.as_lower();
            assert_eq!(SignalType::from_lower(lower), Some(t));
        }
    }
}
