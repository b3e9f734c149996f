//! Edge stability monitor (§4.5.d): per-strategy rolling window of trade
//! outcomes, decay scoring, and alert emission.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{HashMap, VecDeque};

const DEFAULT_WINDOW: usize = 50;
const DEFAULT_MIN_WIN_RATE: f64 = 0.30;
const DEFAULT_MAX_DRAWDOWN: f64 = 0.20;
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub pnl: f64,
    pub return_frac: f64,
    pub won: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum AlertCode {
    SharpeDecay,
    LowWinRate,
    DrawdownBreak,
}

impl AlertCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCode::SharpeDecay => "SHARPE_DECAY",
            AlertCode::LowWinRate => "LOW_WIN_RATE",
            AlertCode::DrawdownBreak => "DRAWDOWN_BREAK",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub win_rate: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub sharpe: f64,
    pub decay_score: Option<f64>,
    pub max_drawdown: f64,
    pub sample_size: usize,
    pub alerts: Vec<AlertCode>,
}

/// Rolling window of trade returns for a single strategy, plus the running
/// equity curve used for drawdown.
#[derive(Debug, Clone)]
struct StrategyWindow {
    returns: VecDeque<f64>,
    wins: VecDeque<bool>,
    window: usize,
    equity: f64,
    peak_equity: f64,
    max_drawdown: f64,
    baseline_sharpe: Option<f64>,
}

impl StrategyWindow {
    fn new(window: usize) -> Self {
        Self {
            returns: VecDeque::with_capacity(window),
            wins: VecDeque::with_capacity(window),
            window,
            equity: 0.0,
            peak_equity: 0.0,
            max_drawdown: 0.0,
            baseline_sharpe: None,
        }
    }

    fn record(&mut self, outcome: TradeOutcome) -> EdgeSnapshot {
        if self.returns.len() >= self.window {
            self.returns.pop_front();
            self.wins.pop_front();
        }
        self.returns.push_back(outcome.return_frac);
        self.wins.push_back(outcome.won);

        self.equity += outcome.pnl;
        self.peak_equity = self.peak_equity.max(self.equity);
        if self.peak_equity > 0.0 {
            let drawdown = (self.peak_equity - self.equity) / self.peak_equity;
            self.max_drawdown = self.max_drawdown.max(drawdown);
        }

        let win_rate = self.wins.iter().filter(|w| **w).count() as f64 / self.window as f64;
        let samples: Vec<f64> = self.returns.iter().copied().collect();
        let mean = samples.clone().mean();
        let std_dev = if samples.len() > 1 { samples.std_dev() } else { 0.0 };
        let sharpe = if std_dev > 0.0 {
            (mean / std_dev) * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        };

        let baseline = *self.baseline_sharpe.get_or_insert(sharpe);
        let decay_score = if baseline != 0.0 {
            Some((baseline - sharpe) / baseline)
        } else {
            None
        };

        EdgeSnapshot {
            win_rate,
            mean,
            std_dev,
            sharpe,
            decay_score,
            max_drawdown: self.max_drawdown,
            sample_size: self.returns.len(),
            alerts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeMonitorConfig {
    pub window: usize,
    pub min_sharpe: f64,
    pub min_win_rate: f64,
    pub max_drawdown: f64,
}

impl Default for EdgeMonitorConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            min_sharpe: 0.0,
            min_win_rate: DEFAULT_MIN_WIN_RATE,
            max_drawdown: DEFAULT_MAX_DRAWDOWN,
        }
    }
}

/// Tracks one rolling window per strategy id. The caller serializes writes
/// per strategy (§5 ordering guarantees); this struct itself is not
/// internally locked.
pub struct EdgeMonitor {
    config: EdgeMonitorConfig,
    windows: HashMap<String, StrategyWindow>,
}

impl EdgeMonitor {
    pub fn new(config: EdgeMonitorConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    pub fn record(&mut self, strategy_id: &str, outcome: TradeOutcome) -> EdgeSnapshot {
        let window = self.config.window;
        let entry = self
            .windows
            .entry(strategy_id.to_string())
            .or_insert_with(|| StrategyWindow::new(window));
        let mut snapshot = entry.record(outcome);

        if snapshot.sharpe < self.config.min_sharpe {
            snapshot.alerts.push(AlertCode::SharpeDecay);
        }
        if snapshot.win_rate < self.config.min_win_rate {
            snapshot.alerts.push(AlertCode::LowWinRate);
        }
        if snapshot.max_drawdown > self.config.max_drawdown {
            snapshot.alerts.push(AlertCode::DrawdownBreak);
        }
        for alert in &snapshot.alerts {
            crate::metrics::record_edge_alert(strategy_id, alert.as_str());
        }
        snapshot
    }

    pub fn snapshot(&self, strategy_id: &str) -> Option<EdgeSnapshot> {
        let entry = self.windows.get(strategy_id)?;
        if entry.returns.is_empty() {
            return None;
        }
        let win_rate = entry.wins.iter().filter(|w| **w).count() as f64 / self.config.window as f64;
        let samples: Vec<f64> = entry.returns.iter().copied().collect();
        let mean = samples.clone().mean();
        let std_dev = if samples.len() > 1 { samples.std_dev() } else { 0.0 };
        let sharpe = if std_dev > 0.0 {
            (mean / std_dev) * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        };
        let decay_score = entry
            .baseline_sharpe
            .filter(|b| *b != 0.0)
            .map(|b| (b - sharpe) / b);

        let mut alerts = Vec::new();
        if sharpe < self.config.min_sharpe {
            alerts.push(AlertCode::SharpeDecay);
        }
        if win_rate < self.config.min_win_rate {
            alerts.push(AlertCode::LowWinRate);
        }
        if entry.max_drawdown > self.config.max_drawdown {
            alerts.push(AlertCode::DrawdownBreak);
        }

        Some(EdgeSnapshot {
            win_rate,
            mean,
            std_dev,
            sharpe,
            decay_score,
            max_drawdown: entry.max_drawdown,
            sample_size: entry.returns.len(),
            alerts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(pnl: f64, return_frac: f64) -> TradeOutcome {
        TradeOutcome {
            pnl,
            return_frac,
            won: pnl > 0.0,
        }
    }

    #[test]
    fn low_win_rate_alert_fires_below_threshold() {
        let mut monitor = EdgeMonitor::new(EdgeMonitorConfig::default());
        let mut snapshot = monitor.record("sma_cross", outcome(-10.0, -0.01));
        for _ in 0..9 {
            snapshot = monitor.record("sma_cross", outcome(-10.0, -0.01));
        }
        assert!(snapshot.win_rate < DEFAULT_MIN_WIN_RATE);
        assert!(snapshot.alerts.contains(&AlertCode::LowWinRate));
    }

    #[test]
    fn drawdown_break_fires_when_equity_falls_from_peak() {
        let mut monitor = EdgeMonitor::new(EdgeMonitorConfig::default());
        monitor.record("rsi_reversion", outcome(1000.0, 0.05));
        let snapshot = monitor.record("rsi_reversion", outcome(-500.0, -0.25));
        assert!(snapshot.max_drawdown > 0.0);
        assert!(snapshot.alerts.contains(&AlertCode::DrawdownBreak));
    }

    #[test]
    fn strategies_maintain_independent_windows() {
        let mut monitor = EdgeMonitor::new(EdgeMonitorConfig::default());
        monitor.record("sma_cross", outcome(100.0, 0.02));
        let other = monitor.snapshot("rsi_reversion");
        assert!(other.is_none());
        assert!(monitor.snapshot("sma_cross").is_some());
    }
}
