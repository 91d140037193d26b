use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::factors::{Conditions, day_of_week_factor, time_slot_factor};
use crate::record::TripRecord;
use crate::stats::{confidence_score, variance, weighted_average};

/// Recency decay applied to historical durations.
const HISTORY_DECAY: f64 = 0.85;

/// Cruising speed assumed when no history exists, km/h.
const FALLBACK_SPEED_KMH: f64 = 25.0;

/// Confidence reported for fallback estimates.
const FALLBACK_CONFIDENCE: u8 = 30;

/// Delay beyond which a trip counts as late, minutes.
pub const DELAY_THRESHOLD_MINUTES: f64 = 5.0;

/// Default probability reported when no history exists.
const DEFAULT_DELAY_PROBABILITY: f64 = 0.3;

/// Neutral reliability reported when no history exists. Callers must not
/// read "no history" as zero reliability.
const DEFAULT_RELIABILITY: f64 = 75.0;

/// Cap on the average-delay penalty applied to reliability.
const MAX_DELAY_PENALTY: f64 = 30.0;

/// How a prediction was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    /// No usable history; distance over an assumed cruising speed.
    FallbackEstimate,
    /// Recency-weighted history adjusted for current conditions.
    HistoricalWeighted,
}

impl Display for PredictionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FallbackEstimate => f.write_str("fallback_estimate"),
            Self::HistoricalWeighted => f.write_str("historical_weighted"),
        }
    }
}

/// Factors applied to a prediction, exposed for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionFactors {
    pub time_slot: f64,
    pub day_of_week: f64,
    pub weather: f64,
    /// Average time-slot factor across the sampled history.
    pub historical_time_slot: f64,
    /// Average day-of-week factor across the sampled history.
    pub historical_day_of_week: f64,
}

/// Output of [`predict_eta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaPrediction {
    pub eta_minutes: f64,
    pub method: PredictionMethod,
    /// 0-100.
    pub confidence: u8,
    pub sample_size: usize,
    /// Weighted-average historical duration the estimate grew from, minutes.
    pub base_duration_minutes: f64,
    /// Overall multiplier applied to the base duration.
    pub adjustment: f64,
    pub factors: PredictionFactors,
    pub duration_variance: f64,
}

/// Output of [`delay_probability`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayProbability {
    /// Fraction of sampled trips exceeding the threshold, 0-1.
    pub probability: f64,
    pub probability_percentage: f64,
    pub threshold_minutes: f64,
    pub sample_size: usize,
    /// 0-100; zero signals insufficient data, not certainty.
    pub confidence: u8,
}

/// Predict a trip duration from history and current conditions.
///
/// With no history the estimate is distance over an assumed cruising speed,
/// adjusted only by current time and day factors and tagged
/// `fallback_estimate` at fixed confidence 30. With history the estimate is
/// the recency-weighted average duration scaled by how current conditions
/// compare to the conditions the history was observed under.
#[must_use]
pub fn predict_eta(history: &[TripRecord], distance_km: f64, conditions: &Conditions) -> EtaPrediction {
    let time_factor = time_slot_factor(conditions.hour);
    let day_factor = day_of_week_factor(conditions.day_of_week);
    let weather_factor = conditions.weather.factor();

    if history.is_empty() {
        let base = distance_km / FALLBACK_SPEED_KMH * 60.0;
        let adjustment = time_factor * day_factor;
        return EtaPrediction {
            eta_minutes: base * adjustment,
            method: PredictionMethod::FallbackEstimate,
            confidence: FALLBACK_CONFIDENCE,
            sample_size: 0,
            base_duration_minutes: base,
            adjustment,
            factors: PredictionFactors {
                time_slot: time_factor,
                day_of_week: day_factor,
                weather: weather_factor,
                historical_time_slot: 1.0,
                historical_day_of_week: 1.0,
            },
            duration_variance: 0.0,
        };
    }

    let durations: Vec<f64> = history.iter().map(|r| r.actual_duration_minutes).collect();
    let base = weighted_average(&durations, HISTORY_DECAY);

    #[allow(clippy::cast_precision_loss)]
    let n = history.len() as f64;
    let avg_time_factor = history.iter().map(|r| time_slot_factor(r.hour_of_day)).sum::<f64>() / n;
    let avg_day_factor = history.iter().map(|r| day_of_week_factor(r.day_of_week)).sum::<f64>() / n;

    let adjustment = (time_factor / avg_time_factor) * (day_factor / avg_day_factor) * weather_factor;
    let duration_variance = variance(&durations);

    EtaPrediction {
        eta_minutes: base * adjustment,
        method: PredictionMethod::HistoricalWeighted,
        confidence: confidence_score(history.len(), duration_variance),
        sample_size: history.len(),
        base_duration_minutes: base,
        adjustment,
        factors: PredictionFactors {
            time_slot: time_factor,
            day_of_week: day_factor,
            weather: weather_factor,
            historical_time_slot: avg_time_factor,
            historical_day_of_week: avg_day_factor,
        },
        duration_variance,
    }
}

/// Fraction of sampled trips whose delay exceeds `threshold_minutes`.
///
/// Empty history yields the default probability at zero confidence - an
/// explicit insufficient-data signal, not an error.
#[must_use]
pub fn delay_probability(history: &[TripRecord], threshold_minutes: f64) -> DelayProbability {
    if history.is_empty() {
        return DelayProbability {
            probability: DEFAULT_DELAY_PROBABILITY,
            probability_percentage: DEFAULT_DELAY_PROBABILITY * 100.0,
            threshold_minutes,
            sample_size: 0,
            confidence: 0,
        };
    }

    let delayed = history.iter().filter(|r| r.delay_minutes > threshold_minutes).count();
    #[allow(clippy::cast_precision_loss)]
    let probability = delayed as f64 / history.len() as f64;
    let delays: Vec<f64> = history.iter().map(|r| r.delay_minutes).collect();

    DelayProbability {
        probability,
        probability_percentage: probability * 100.0,
        threshold_minutes,
        sample_size: history.len(),
        confidence: confidence_score(history.len(), variance(&delays)),
    }
}

/// Reliability score in [0, 100]: the on-time fraction (|delay| within the
/// threshold) scaled to 100, penalised by twice the average delay up to a
/// 30-point cap. Empty history returns a neutral default, never zero.
#[must_use]
pub fn reliability_score(history: &[TripRecord]) -> f64 {
    if history.is_empty() {
        return DEFAULT_RELIABILITY;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = history.len() as f64;
    let on_time = history
        .iter()
        .filter(|r| r.delay_minutes.abs() <= DELAY_THRESHOLD_MINUTES)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let on_time_share = on_time as f64 / n;

    let avg_delay = history.iter().map(|r| r.delay_minutes).sum::<f64>() / n;
    let penalty = (avg_delay * 2.0).min(MAX_DELAY_PENALTY);

    (on_time_share * 100.0 - penalty).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::factors::Weather;

    use super::*;

    fn record(hour: u8, day: u8, actual: f64, expected: f64) -> TripRecord {
        TripRecord {
            route_id: "route-42".to_string(),
            day_of_week: day,
            hour_of_day: hour,
            actual_duration_minutes: actual,
            expected_duration_minutes: expected,
            delay_minutes: (actual - expected).max(0.0),
            weather: Weather::Clear,
            traffic_rank: 2,
            distance_km: 10.0,
        }
    }

    fn midweek_afternoon() -> Conditions {
        Conditions { hour: 14, day_of_week: 3, weather: Weather::Unknown }
    }

    #[test]
    fn empty_history_falls_back() {
        let prediction = predict_eta(&[], 10.0, &midweek_afternoon());

        assert_eq!(prediction.method, PredictionMethod::FallbackEstimate);
        assert_eq!(prediction.method.to_string(), "fallback_estimate");
        assert_eq!(prediction.confidence, 30);
        assert_eq!(prediction.sample_size, 0);
        // 10 km at 25 km/h is 24 minutes, stretched by midday and Wednesday
        let expected = 24.0 * 1.2 * 1.05;
        assert!((prediction.eta_minutes - expected).abs() < 1e-9);
    }

    #[test]
    fn history_drives_estimate() {
        let history: Vec<TripRecord> = (0..20).map(|_| record(14, 3, 30.0, 30.0)).collect();
        let prediction = predict_eta(&history, 10.0, &midweek_afternoon());

        assert_eq!(prediction.method, PredictionMethod::HistoricalWeighted);
        assert_eq!(prediction.sample_size, 20);
        // same conditions as the history, so only the weather factor applies
        let expected = 30.0 * Weather::Unknown.factor();
        assert!((prediction.eta_minutes - expected).abs() < 1e-6);
        assert!(prediction.confidence > 30);
    }

    #[test]
    fn peak_conditions_stretch_midday_history() {
        let history: Vec<TripRecord> = (0..20).map(|_| record(14, 3, 30.0, 30.0)).collect();
        let peak = Conditions { hour: 8, day_of_week: 5, weather: Weather::Rain };
        let prediction = predict_eta(&history, 10.0, &peak);

        assert!(prediction.eta_minutes > 30.0);
        assert!(prediction.adjustment > 1.0);
        assert!((prediction.factors.historical_time_slot - 1.2).abs() < 1e-9);
    }

    #[test]
    fn delay_probability_counts_threshold_breaches() {
        let mut history: Vec<TripRecord> = (0..8).map(|_| record(14, 3, 30.0, 30.0)).collect();
        history.push(record(14, 3, 40.0, 30.0));
        history.push(record(14, 3, 42.0, 30.0));

        let result = delay_probability(&history, 5.0);
        assert!((result.probability - 0.2).abs() < 1e-9);
        assert!((result.probability_percentage - 20.0).abs() < 1e-9);
        assert_eq!(result.sample_size, 10);
    }

    #[test]
    fn delay_probability_insufficient_data() {
        let result = delay_probability(&[], 5.0);
        assert!((result.probability - 0.3).abs() < 1e-9);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.sample_size, 0);
    }

    #[test]
    fn consistent_on_time_history_scores_high() {
        let history: Vec<TripRecord> = (0..50).map(|_| record(9, 2, 30.0, 30.0)).collect();

        let probability = delay_probability(&history, 5.0);
        assert!(probability.probability_percentage.abs() < 1e-9);

        let reliability = reliability_score(&history);
        assert!(reliability >= 90.0);
    }

    #[test]
    fn chronic_delays_drag_reliability_down() {
        let history: Vec<TripRecord> = (0..20).map(|_| record(9, 2, 50.0, 30.0)).collect();
        let reliability = reliability_score(&history);

        // nothing on time and the penalty is capped at 30
        assert_eq!(reliability, 0.0);
    }

    #[test]
    fn reliability_bounds_and_empty_default() {
        assert_eq!(reliability_score(&[]), 75.0);

        let history: Vec<TripRecord> = (0..10).map(|_| record(9, 2, 33.0, 30.0)).collect();
        let score = reliability_score(&history);
        assert!((0.0..=100.0).contains(&score));
    }
}
