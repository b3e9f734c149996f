//! Simple moving-average crossover. Deterministic step sequence: compute the
//! short SMA and long SMA over the trailing window (plain arithmetic mean,
//! left to right), compare the last two bars, emit on a cross.

use crate::domain::{Candle, SignalType};
use crate::signals::strategy::{Strategy, StrategyOutput};

pub struct SmaCrossStrategy {
    id: String,
    short_window: usize,
    long_window: usize,
    stop_pct: f64,
    target_pct: f64,
}

impl SmaCrossStrategy {
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            id: format!("sma_cross_{short_window}_{long_window}"),
            short_window,
            long_window,
            stop_pct: 0.02,
            target_pct: 0.05,
        }
    }

    fn sma(closes: &[f64], window: usize) -> f64 {
        let slice = &closes[closes.len() - window..];
        slice.iter().sum::<f64>() / window as f64
    }
}

impl Strategy for SmaCrossStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "sma_cross"
    }

    fn required_bars(&self) -> usize {
        self.long_window + 1
    }

    fn analyze(&self, _symbol: &str, candles: &[Candle]) -> Option<StrategyOutput> {
        if candles.len() < self.required_bars() {
            return None;
        }
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let short_now = Self::sma(&closes, self.short_window);
        let long_now = Self::sma(&closes, self.long_window);
        let prev_closes = &closes[..closes.len() - 1];
        let short_prev = Self::sma(prev_closes, self.short_window);
        let long_prev = Self::sma(prev_closes, self.long_window);

        let entry = *closes.last().unwrap();
        let mut indicators = serde_json::Map::new();
        indicators.insert("sma_short".into(), serde_json::json!(short_now));
        indicators.insert("sma_long".into(), serde_json::json!(long_now));

        let crossed_up = short_prev <= long_prev && short_now > long_now;
        let crossed_down = short_prev >= long_prev && short_now < long_now;

        if crossed_up {
            Some(StrategyOutput {
                signal_type: SignalType::Buy,
                confidence: ((short_now - long_now) / long_now).abs().min(1.0).max(0.5),
                entry_price: entry,
                stop_loss: entry * (1.0 - self.stop_pct),
                take_profit: vec![entry * (1.0 + self.target_pct)],
                reasoning: format!(
                    "{}-period SMA crossed above {}-period SMA",
                    self.short_window, self.long_window
                ),
                indicators,
            })
        } else if crossed_down {
            Some(StrategyOutput {
                signal_type: SignalType::Sell,
                confidence: ((long_now - short_now) / long_now).abs().min(1.0).max(0.5),
                entry_price: entry,
                stop_loss: entry * (1.0 + self.stop_pct),
                take_profit: vec![entry * (1.0 - self.target_pct)],
                reasoning: format!(
                    "{}-period SMA crossed below {}-period SMA",
                    self.short_window, self.long_window
                ),
                indicators,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(close: f64) -> Candle {
        Candle {
            symbol: "AAPL".into(),
            timestamp: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
            vwap: None,
        }
    }

    #[test]
    fn emits_buy_on_upward_cross() {
        let strategy = SmaCrossStrategy::new(2, 3);
        // long SMA stays flat-ish, short SMA ramps up on the last bar
        let closes = [100.0, 100.0, 100.0, 100.0, 130.0];
        let candles: Vec<Candle> = closes.iter().map(|&c| candle(c)).collect();
        let output = strategy.analyze("AAPL", &candles).unwrap();
        assert_eq!(output.signal_type, SignalType::Buy);
        assert!(output.stop_loss < output.entry_price);
    }

    #[test]
    fn insufficient_bars_yields_none() {
        let strategy = SmaCrossStrategy::new(2, 3);
        let candles: Vec<Candle> = vec![candle(100.0), candle(101.0)];
        assert!(strategy.analyze("AAPL", &candles).is_none());
    }
}
