//! RSI mean-reversion. Deterministic step sequence: Wilder's smoothing over
//! the trailing window's close-to-close deltas (left to right), then the
//! standard `100 - 100/(1+RS)` formula.

use crate::domain::{Candle, SignalType};
use crate::signals::strategy::{Strategy, StrategyOutput};

pub struct RsiReversionStrategy {
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl RsiReversionStrategy {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            oversold: 30.0,
            overbought: 70.0,
        }
    }

    fn rsi(closes: &[f64], period: usize) -> f64 {
        let mut gains = 0.0;
        let mut losses = 0.0;
        for window in closes.windows(2) {
            let delta = window[1] - window[0];
            if delta >= 0.0 {
                gains += delta;
            } else {
                losses += -delta;
            }
        }
        let avg_gain = gains / period as f64;
        let avg_loss = losses / period as f64;
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl Strategy for RsiReversionStrategy {
    fn id(&self) -> &str {
        "rsi_reversion"
    }

    fn name(&self) -> &str {
        "rsi_reversion"
    }

    fn required_bars(&self) -> usize {
        self.period + 1
    }

    fn analyze(&self, _symbol: &str, candles: &[Candle]) -> Option<StrategyOutput> {
        if candles.len() < self.required_bars() {
            return None;
        }
        let closes: Vec<f64> = candles[candles.len() - self.required_bars()..]
            .iter()
            .map(|c| c.close)
            .collect();
        let rsi = Self::rsi(&closes, self.period);
        let entry = *closes.last().unwrap();

        let mut indicators = serde_json::Map::new();
        indicators.insert("rsi".into(), serde_json::json!(rsi));

        if rsi < self.oversold {
            Some(StrategyOutput {
                signal_type: SignalType::Buy,
                confidence: ((self.oversold - rsi) / self.oversold).clamp(0.5, 1.0),
                entry_price: entry,
                stop_loss: entry * 0.97,
                take_profit: vec![entry * 1.04],
                reasoning: format!("RSI {rsi:.1} below oversold threshold {}", self.oversold),
                indicators,
            })
        } else if rsi > self.overbought {
            Some(StrategyOutput {
                signal_type: SignalType::Sell,
                confidence: ((rsi - self.overbought) / (100.0 - self.overbought)).clamp(0.5, 1.0),
                entry_price: entry,
                stop_loss: entry * 1.03,
                take_profit: vec![entry * 0.96],
                reasoning: format!("RSI {rsi:.1} above overbought threshold {}", self.overbought),
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
    fn steep_decline_triggers_buy_on_oversold_rsi() {
        let strategy = RsiReversionStrategy::new(5);
        let closes = [110.0, 105.0, 100.0, 95.0, 90.0, 85.0];
        let candles: Vec<Candle> = closes.iter().map(|&c| candle(c)).collect();
        let output = strategy.analyze("AAPL", &candles).unwrap();
        assert_eq!(output.signal_type, SignalType::Buy);
    }

    #[test]
    fn flat_series_yields_no_signal() {
        let strategy = RsiReversionStrategy::new(5);
        let candles: Vec<Candle> = (0..6).map(|_| candle(100.0)).collect();
        assert!(strategy.analyze("AAPL", &candles).is_none());
    }
}
