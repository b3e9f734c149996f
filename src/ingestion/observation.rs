//! Observation normalization (§4.1): turns an external research payload into
//! a canonical `MarketEvent`, decides which bank it belongs to, and scores
//! it for retention.

use crate::domain::{normalize_tags, MarketEvent, NormalizedBank, Observation, ObservationKind};
use crate::errors::AppError;

pub struct NormalizedObservation {
    pub bank: NormalizedBank,
    pub event: MarketEvent,
}

fn summary_for(obs: &Observation) -> Result<String, AppError> {
    let symbol = obs.symbol.to_uppercase();
    match obs.kind {
        ObservationKind::Earnings => Ok(format!("Dexter detected earnings for {symbol}.")),
        ObservationKind::NewsHeadline => {
            let headline = obs
                .headline
                .as_ref()
                .ok_or_else(|| AppError::Validation("news_headline observation missing headline".into()))?;
            Ok(format!("Dexter news for {symbol}: {headline}."))
        }
        ObservationKind::UnusualVolume => {
            let multiple = obs.volume_multiple.ok_or_else(|| {
                AppError::Validation("unusual_volume observation missing volumeMultiple".into())
            })?;
            Ok(format!(
                "Dexter detected unusual volume for {symbol} ({multiple}x avg)."
            ))
        }
        ObservationKind::PriceGap => {
            let pct = obs
                .gap_percent
                .ok_or_else(|| AppError::Validation("price_gap observation missing gapPercent".into()))?;
            Ok(format!("Dexter detected price gap for {symbol} ({pct}%)."))
        }
    }
}

fn bank_for(kind: ObservationKind) -> NormalizedBank {
    match kind {
        ObservationKind::Earnings | ObservationKind::NewsHeadline => NormalizedBank::MarketEvents,
        ObservationKind::UnusualVolume | ObservationKind::PriceGap => NormalizedBank::Signals,
    }
}

fn event_type_for(kind: ObservationKind) -> &'static str {
    match kind {
        ObservationKind::Earnings => "earnings_event",
        ObservationKind::NewsHeadline => "news_event",
        ObservationKind::UnusualVolume => "unusual_volume",
        ObservationKind::PriceGap => "price_gap",
    }
}

fn observation_kind_tag(kind: ObservationKind) -> &'static str {
    match kind {
        ObservationKind::Earnings => "earnings",
        ObservationKind::NewsHeadline => "news_headline",
        ObservationKind::UnusualVolume => "unusual_volume",
        ObservationKind::PriceGap => "price_gap",
    }
}

/// Normalize one observation into a canonical event, validating confidence
/// bounds at ingress rather than rescaling (resolved open question).
pub fn normalize(obs: &Observation) -> Result<NormalizedObservation, AppError> {
    if !(0.0..=1.0).contains(&obs.confidence) {
        return Err(AppError::Validation(format!(
            "confidence {} out of range [0,1]",
            obs.confidence
        )));
    }
    if !(-1.0..=1.0).contains(&obs.impact_estimate) {
        return Err(AppError::Validation(format!(
            "impactEstimate {} out of range [-1,1]",
            obs.impact_estimate
        )));
    }

    let summary = summary_for(obs)?;

    let mut tags: Vec<String> = obs.tags.clone();
    tags.push(observation_kind_tag(obs.kind).to_string());
    if obs.bookmarked.unwrap_or(false) {
        tags.push("bookmarked".to_string());
    }

    let event = MarketEvent {
        ts: obs.timestamp,
        event_type: event_type_for(obs.kind).to_string(),
        symbol: obs.symbol.to_uppercase(),
        tags: normalize_tags(tags),
        summary,
        impact_estimate: obs.impact_estimate,
        confidence: obs.confidence,
        source: "dexter".to_string(),
    };

    Ok(NormalizedObservation {
        bank: bank_for(obs.kind),
        event,
    })
}

/// `|impactEstimate|` if non-zero else `|confidence|`.
pub fn retention_score(obs: &Observation) -> f64 {
    if obs.impact_estimate != 0.0 {
        obs.impact_estimate.abs()
    } else {
        obs.confidence.abs()
    }
}

/// Retained iff bookmarked, or threshold <= 0, or score >= threshold.
pub fn should_retain(obs: &Observation, threshold: f64) -> bool {
    obs.bookmarked.unwrap_or(false) || threshold <= 0.0 || retention_score(obs) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn earnings_observation() -> Observation {
        Observation {
            kind: ObservationKind::Earnings,
            symbol: "aapl".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            impact_estimate: 0.82,
            confidence: 0.71,
            tags: vec!["EARNINGS".into(), "Q4".into()],
            headline: None,
            volume_multiple: None,
            gap_percent: None,
            bookmarked: None,
        }
    }

    #[test]
    fn earnings_event_retention_scenario() {
        let obs = earnings_observation();
        assert!(should_retain(&obs, 0.7));

        let normalized = normalize(&obs).unwrap();
        assert_eq!(normalized.bank, NormalizedBank::MarketEvents);
        assert_eq!(normalized.event.symbol, "AAPL");
        assert_eq!(normalized.event.event_type, "earnings_event");
        assert_eq!(normalized.event.tags, vec!["earnings", "q4"]);
        assert_eq!(
            normalized.event.summary,
            "Dexter detected earnings for AAPL."
        );
    }

    #[test]
    fn confidence_out_of_range_is_rejected_not_rescaled() {
        let mut obs = earnings_observation();
        obs.confidence = 1.5;
        assert!(matches!(normalize(&obs), Err(AppError::Validation(_))));
    }

    #[test]
    fn news_headline_without_headline_is_fail_fast() {
        let obs = Observation {
            kind: ObservationKind::NewsHeadline,
            headline: None,
            ..earnings_observation()
        };
        assert!(matches!(normalize(&obs), Err(AppError::Validation(_))));
    }

    #[test]
    fn bookmarked_observation_is_always_retained() {
        let obs = Observation {
            bookmarked: Some(true),
            impact_estimate: 0.0,
            confidence: 0.01,
            ..earnings_observation()
        };
        assert!(should_retain(&obs, 0.9));
    }

    #[test]
    fn unusual_volume_lands_in_signals_bank() {
        let obs = Observation {
            kind: ObservationKind::UnusualVolume,
            volume_multiple: Some(3.5),
            ..earnings_observation()
        };
        let normalized = normalize(&obs).unwrap();
        assert_eq!(normalized.bank, NormalizedBank::Signals);
    }
}
