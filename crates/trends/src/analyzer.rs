use std::sync::Arc;
use std::time::Duration;

use realtime::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::factors::{Conditions, Weather};
use crate::predict::{
    DELAY_THRESHOLD_MINUTES, DelayProbability, EtaPrediction, delay_probability, predict_eta,
    reliability_score,
};
use crate::provider::{HistoryQuery, TripHistoryStore};
use crate::record::TripRecord;

/// Combined delay outlook for a route under given conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayStatistics {
    pub delay: DelayProbability,
    /// 0-100.
    pub reliability: f64,
    pub sample_size: usize,
}

/// A finished trip reported by the orchestration layer, before it becomes
/// an immutable [`TripRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripCompletion {
    pub route_id: String,
    /// Local day of week, 0 = Sunday.
    pub day_of_week: u8,
    /// Local hour of day, 0-23.
    pub hour_of_day: u8,
    pub actual_duration_minutes: f64,
    pub expected_duration_minutes: f64,
    pub weather: Weather,
    /// Congestion rank, 1-5.
    pub traffic_rank: u8,
    pub distance_km: f64,
}

/// Queries trip history through the provider seam and runs the estimators
/// over whatever window comes back. History access is the only blocking
/// call here and is bounded by `query_timeout`; a failed or slow query
/// degrades to the fallback estimators rather than erroring, since
/// prediction is additive to live tracking.
#[derive(Clone)]
pub struct TrendAnalyzer {
    history: Arc<dyn TripHistoryStore>,
    query_timeout: Duration,
    window_limit: usize,
}

impl TrendAnalyzer {
    #[must_use]
    pub fn new(
        history: Arc<dyn TripHistoryStore>, query_timeout: Duration, window_limit: usize,
    ) -> Self {
        Self { history, query_timeout, window_limit }
    }

    /// Predict the ETA for a route under current conditions.
    pub async fn predicted_eta(
        &self, route_id: &str, distance_km: f64, conditions: &Conditions,
    ) -> EtaPrediction {
        let history = self.sample(route_id, Some(conditions)).await;
        predict_eta(&history, distance_km, conditions)
    }

    /// Delay probability and reliability for a route.
    pub async fn delay_statistics(
        &self, route_id: &str, conditions: Option<&Conditions>,
    ) -> DelayStatistics {
        let history = self.sample(route_id, conditions).await;
        let delay = delay_probability(&history, DELAY_THRESHOLD_MINUTES);
        DelayStatistics {
            reliability: reliability_score(&history),
            sample_size: history.len(),
            delay,
        }
    }

    /// Turn a completed trip into an immutable record and append it to the
    /// historical store. Early arrivals are floored to zero delay for
    /// compatibility with the records already on file.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` for out-of-range fields and
    /// `Error::BadGateway` when the store rejects the append.
    pub async fn record_trip(&self, completion: TripCompletion) -> Result<TripRecord> {
        let record = TripRecord {
            route_id: completion.route_id,
            day_of_week: completion.day_of_week,
            hour_of_day: completion.hour_of_day,
            actual_duration_minutes: completion.actual_duration_minutes,
            expected_duration_minutes: completion.expected_duration_minutes,
            delay_minutes: (completion.actual_duration_minutes
                - completion.expected_duration_minutes)
                .max(0.0),
            weather: completion.weather,
            traffic_rank: completion.traffic_rank,
            distance_km: completion.distance_km,
        };
        record.validate()?;

        self.history
            .append(&record)
            .await
            .map_err(|err| realtime::bad_gateway!("appending trip record: {err}"))?;

        Ok(record)
    }

    /// Fetch a bounded history window, narrowing by conditions when given.
    /// Soft-fails to an empty window.
    async fn sample(&self, route_id: &str, conditions: Option<&Conditions>) -> Vec<TripRecord> {
        let query = HistoryQuery {
            route_id: route_id.to_string(),
            day_of_week: conditions.map(|c| c.day_of_week),
            hour_of_day: conditions.map(|c| c.hour),
            limit: self.window_limit,
        };

        match tokio::time::timeout(self.query_timeout, self.history.query(&query)).await {
            Ok(Ok(records)) => records,
            Ok(Err(err)) => {
                warn!(
                    monotonic_counter.history_query_failures = 1,
                    route_id = %route_id,
                    error = %err,
                    "trip history query failed"
                );
                Vec::new()
            }
            Err(_) => {
                warn!(
                    monotonic_counter.history_query_timeouts = 1,
                    route_id = %route_id,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "trip history query timed out"
                );
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for TrendAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrendAnalyzer")
            .field("query_timeout", &self.query_timeout)
            .field("window_limit", &self.window_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use realtime::Error;

    use crate::predict::PredictionMethod;

    use super::*;

    #[derive(Default)]
    struct MockHistory {
        records: Mutex<Vec<TripRecord>>,
        delay: Option<Duration>,
        fail: bool,
    }

    #[async_trait]
    impl TripHistoryStore for MockHistory {
        async fn query(&self, query: &HistoryQuery) -> anyhow::Result<Vec<TripRecord>> {
            if self.fail {
                return Err(anyhow!("store offline"));
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let records = self.records.lock().expect("lock");
            Ok(records
                .iter()
                .filter(|r| r.route_id == query.route_id)
                .take(query.limit)
                .cloned()
                .collect())
        }

        async fn append(&self, record: &TripRecord) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow!("store offline"));
            }
            self.records.lock().expect("lock").push(record.clone());
            Ok(())
        }
    }

    fn completion(actual: f64, expected: f64) -> TripCompletion {
        TripCompletion {
            route_id: "route-42".to_string(),
            day_of_week: 3,
            hour_of_day: 14,
            actual_duration_minutes: actual,
            expected_duration_minutes: expected,
            weather: Weather::Clear,
            traffic_rank: 2,
            distance_km: 10.0,
        }
    }

    fn analyzer(store: MockHistory) -> TrendAnalyzer {
        TrendAnalyzer::new(Arc::new(store), Duration::from_millis(100), 50)
    }

    #[tokio::test]
    async fn recorded_trips_feed_predictions() {
        let analyzer = analyzer(MockHistory::default());
        for _ in 0..10 {
            analyzer.record_trip(completion(30.0, 30.0)).await.unwrap();
        }

        let conditions = Conditions { hour: 14, day_of_week: 3, weather: Weather::Clear };
        let prediction = analyzer.predicted_eta("route-42", 10.0, &conditions).await;

        assert_eq!(prediction.method, PredictionMethod::HistoricalWeighted);
        assert_eq!(prediction.sample_size, 10);
    }

    #[tokio::test]
    async fn early_arrival_delay_floored_at_zero() {
        let analyzer = analyzer(MockHistory::default());
        let record = analyzer.record_trip(completion(25.0, 30.0)).await.unwrap();
        assert_eq!(record.delay_minutes, 0.0);
    }

    #[tokio::test]
    async fn invalid_completion_rejected() {
        let analyzer = analyzer(MockHistory::default());
        let mut bad = completion(30.0, 30.0);
        bad.traffic_rank = 9;

        let err = analyzer.record_trip(bad).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn store_failure_degrades_to_fallback() {
        let analyzer = analyzer(MockHistory { fail: true, ..MockHistory::default() });
        let conditions = Conditions { hour: 14, day_of_week: 3, weather: Weather::Unknown };

        let prediction = analyzer.predicted_eta("route-42", 10.0, &conditions).await;
        assert_eq!(prediction.method, PredictionMethod::FallbackEstimate);
        assert_eq!(prediction.confidence, 30);
    }

    #[tokio::test]
    async fn slow_store_times_out_to_fallback() {
        let store =
            MockHistory { delay: Some(Duration::from_millis(500)), ..MockHistory::default() };
        let analyzer = analyzer(store);
        let conditions = Conditions { hour: 14, day_of_week: 3, weather: Weather::Unknown };

        let prediction = analyzer.predicted_eta("route-42", 10.0, &conditions).await;
        assert_eq!(prediction.method, PredictionMethod::FallbackEstimate);
    }

    #[tokio::test]
    async fn delay_statistics_over_recorded_history() {
        let analyzer = analyzer(MockHistory::default());
        for _ in 0..50 {
            analyzer.record_trip(completion(30.0, 30.0)).await.unwrap();
        }

        let stats = analyzer.delay_statistics("route-42", None).await;
        assert!(stats.delay.probability_percentage.abs() < 1e-9);
        assert!(stats.reliability >= 90.0);
        assert_eq!(stats.sample_size, 50);
    }
}
