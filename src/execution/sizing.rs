//! Position sizing (§4.5.b). Pure function of account/signal state; all
//! monetary values are `f64`, rounding is explicit `floor`.

use crate::errors::AppError;

#[derive(Debug, Clone, Copy)]
pub struct SizingInput {
    pub net_liquidation: f64,
    pub buying_power: f64,
    pub risk_per_trade: f64,
    pub max_position_pct: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingOutput {
    pub risk_amount: f64,
    pub stop_distance: f64,
    pub quantity: u64,
    pub position_value: f64,
}

pub fn size_position(input: SizingInput) -> Result<SizingOutput, AppError> {
    let stop_distance = (input.entry_price - input.stop_loss).abs();
    if stop_distance == 0.0 {
        return Err(AppError::Validation("invalid stop loss".into()));
    }

    let risk_amount = input.net_liquidation * input.risk_per_trade;
    let mut raw_shares = (risk_amount / stop_distance).floor();
    let mut position_value = raw_shares * input.entry_price;

    let max_position_value = input.net_liquidation * input.max_position_pct;
    if position_value > max_position_value {
        raw_shares = (max_position_value / input.entry_price).floor();
        position_value = raw_shares * input.entry_price;
    }

    let required = position_value;
    if required > input.buying_power {
        return Err(AppError::Validation(format!(
            "insufficient buying power: need ${required:.2}, have ${:.2}",
            input.buying_power
        )));
    }

    if raw_shares < 1.0 {
        return Err(AppError::Validation("position size below minimum".into()));
    }

    Ok(SizingOutput {
        risk_amount,
        stop_distance,
        quantity: raw_shares as u64,
        position_value,
    })
}

/// `|T - E| / stopDistance`.
pub fn r_multiple(target: f64, entry: f64, stop_distance: f64) -> f64 {
    (target - entry).abs() / stop_distance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_sizing_scenario() {
        let output = size_position(SizingInput {
            net_liquidation: 100_000.0,
            buying_power: 100_000.0,
            risk_per_trade: 0.01,
            max_position_pct: 0.30,
            entry_price: 150.0,
            stop_loss: 145.0,
        })
        .unwrap();
        assert_eq!(output.risk_amount, 1_000.0);
        assert_eq!(output.stop_distance, 5.0);
        assert_eq!(output.quantity, 200);
        assert_eq!(output.position_value, 30_000.0);
    }

    #[test]
    fn sizing_capped_by_position_limit() {
        let output = size_position(SizingInput {
            net_liquidation: 100_000.0,
            buying_power: 100_000.0,
            risk_per_trade: 0.01,
            max_position_pct: 0.20,
            entry_price: 800.0,
            stop_loss: 795.0,
        })
        .unwrap();
        assert_eq!(output.quantity, 25);
        assert_eq!(output.position_value, 20_000.0);
    }

    #[test]
    fn rejects_on_insufficient_buying_power() {
        let err = size_position(SizingInput {
            net_liquidation: 100_000.0,
            buying_power: 10_000.0,
            risk_per_trade: 0.01,
            max_position_pct: 0.30,
            entry_price: 150.0,
            stop_loss: 145.0,
        })
        .unwrap_err();
        match err {
            AppError::Validation(msg) => {
                assert_eq!(msg, "insufficient buying power: need $30000.00, have $10000.00");
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn zero_stop_distance_is_rejected() {
        let err = size_position(SizingInput {
            net_liquidation: 100_000.0,
            buying_power: 100_000.0,
            risk_per_trade: 0.01,
            max_position_pct: 0.30,
            entry_price: 150.0,
            stop_loss: 150.0,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg == "invalid stop loss"));
    }

    #[test]
    fn quantity_below_one_share_is_rejected() {
        let err = size_position(SizingInput {
            net_liquidation: 1_000.0,
            buying_power: 1_000.0,
            risk_per_trade: 0.005,
            max_position_pct: 0.10,
            entry_price: 500.0,
            stop_loss: 499.0,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg == "position size below minimum"));
    }
}
