//! Strategy contract (§4.2): `{id, name, requiredBars, analyze}`. `analyze`
//! is a pure function of the candle window and the strategy's own
//! parameters — no clock reads, no I/O — so the embedded and standalone
//! topologies produce byte-identical signals from the same fixture.

use crate::domain::{Candle, SignalType};

#[derive(Debug, Clone)]
pub struct StrategyOutput {
    pub signal_type: SignalType,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Vec<f64>,
    pub reasoning: String,
    pub indicators: serde_json::Map<String, serde_json::Value>,
}

pub trait Strategy: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn required_bars(&self) -> usize;

    /// `candles` is a trailing window sorted ascending by time, length
    /// exactly `required_bars` or more. Returns at most one signal.
    fn analyze(&self, symbol: &str, candles: &[Candle]) -> Option<StrategyOutput>;
}

/// Tie-break rule (§4.2): higher confidence wins; ties broken by
/// lexicographically smaller `reasoning`.
pub fn pick_winner<'a>(
    candidates: impl IntoIterator<Item = &'a StrategyOutput>,
) -> Option<&'a StrategyOutput> {
    candidates.into_iter().reduce(|best, candidate| {
        match candidate
            .confidence
            .partial_cmp(&best.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
        {
            std::cmp::Ordering::Greater => candidate,
            std::cmp::Ordering::Less => best,
            std::cmp::Ordering::Equal => {
                if candidate.reasoning < best.reasoning {
                    candidate
                } else {
                    best
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(confidence: f64, reasoning: &str) -> StrategyOutput {
        StrategyOutput {
            signal_type: SignalType::Buy,
            confidence,
            entry_price: 100.0,
            stop_loss: 95.0,
            take_profit: vec![110.0],
            reasoning: reasoning.to_string(),
            indicators: serde_json::Map::new(),
        }
    }

    #[test]
    fn higher_confidence_wins() {
        let a = output(0.6, "b");
        let b = output(0.8, "a");
        let winner = pick_winner([&a, &b]).unwrap();
        assert_eq!(winner.confidence, 0.8);
    }

    #[test]
    fn ties_broken_by_lexicographic_reasoning() {
        let a = output(0.7, "zeta");
        let b = output(0.7, "alpha");
        let winner = pick_winner([&a, &b]).unwrap();
        assert_eq!(winner.reasoning, "alpha");
    }
}
