//! End-to-end flows through the assembled engine: telemetry in, events and
//! notifications out, with in-memory stand-ins for the persistence
//! collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use buslive::{Config, Engine, PredictionRequest, TelemetryReport};
use chrono::{TimeZone, Utc};
use fleet::PassengerAction;
use geo::LatLng;
use pretty_assertions::assert_eq;
use realtime::{Error, SystemClock, VehicleDocStore};
use trends::{HistoryQuery, PredictionMethod, TripHistoryStore, TripRecord, Weather};

#[derive(Default)]
struct MemoryDocStore {
    docs: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl VehicleDocStore for MemoryDocStore {
    async fn fetch(&self, device_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.docs.lock().expect("lock").get(device_id).cloned())
    }

    async fn store(&self, device_id: &str, doc: &[u8]) -> Result<()> {
        self.docs.lock().expect("lock").insert(device_id.to_string(), doc.to_vec());
        Ok(())
    }

    async fn delete(&self, device_id: &str) -> Result<()> {
        self.docs.lock().expect("lock").remove(device_id);
        Ok(())
    }
}

#[derive(Default)]
struct MemoryHistory {
    records: Mutex<Vec<TripRecord>>,
}

impl MemoryHistory {
    fn seeded(records: Vec<TripRecord>) -> Self {
        Self { records: Mutex::new(records) }
    }
}

#[async_trait]
impl TripHistoryStore for MemoryHistory {
    async fn query(&self, query: &HistoryQuery) -> Result<Vec<TripRecord>> {
        let records = self.records.lock().expect("lock");
        Ok(records
            .iter()
            .filter(|r| r.route_id == query.route_id)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn append(&self, record: &TripRecord) -> Result<()> {
        self.records.lock().expect("lock").push(record.clone());
        Ok(())
    }
}

fn engine() -> Engine {
    engine_with_history(MemoryHistory::default())
}

fn engine_with_history(history: MemoryHistory) -> Engine {
    Engine::new(
        Config::from_env(),
        Arc::new(MemoryDocStore::default()),
        Arc::new(history),
        Arc::new(SystemClock),
    )
}

fn zero_delay_record(route_id: &str) -> TripRecord {
    TripRecord {
        route_id: route_id.to_string(),
        day_of_week: 3,
        hour_of_day: 9,
        actual_duration_minutes: 30.0,
        expected_duration_minutes: 30.0,
        delay_minutes: 0.0,
        weather: Weather::Clear,
        traffic_rank: 2,
        distance_km: 12.0,
    }
}

// Two position fixes a minute apart must yield derived speed and bearing
// and an eta-update with a non-negative estimate.
#[tokio::test]
async fn moving_vehicle_gets_speed_bearing_and_eta() {
    let engine = engine();
    let mut watcher = engine.hub().connect().await;
    engine.hub().join(watcher.id(), &hub::bus_topic("BUS001")).await;

    let t0 = Utc.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap();

    let mut first = TelemetryReport::for_device("BUS001");
    first.timestamp = Some(t0);
    first.position = Some(LatLng::new(12.9700, 77.5900));
    first.destination = Some(LatLng::new(12.9750, 77.6000));
    engine.report_telemetry(first).await.unwrap();

    let mut second = TelemetryReport::for_device("BUS001");
    second.timestamp = Some(t0 + chrono::Duration::minutes(1));
    second.position = Some(LatLng::new(12.9716, 77.5946));
    let outcome = engine.report_telemetry(second).await.unwrap();

    // motion derived from the two fixes
    assert!(outcome.state.telemetry.speed > 0.0);
    assert!((0.0..360.0).contains(&outcome.state.telemetry.direction));

    let estimate = outcome.eta.expect("destination is known");
    assert!(estimate.eta_minutes >= 0.0);
    assert!(estimate.distance > 0.0);

    // an eta-update reached the topic along with the live updates
    let mut events = Vec::new();
    while let Some(envelope) = watcher.try_recv() {
        events.push(envelope.event);
    }
    assert!(events.iter().any(|event| event == "eta-update"), "events: {events:?}");
    assert!(events.iter().any(|event| event == "location-update"));
    assert!(events.iter().any(|event| event == "tracking-update"));
}

// Prediction with no history is the tagged fallback at confidence 30.
#[tokio::test]
async fn prediction_without_history_is_fallback() {
    let engine = engine();
    let prediction = engine
        .predicted_eta(PredictionRequest {
            route_id: "route-7".to_string(),
            distance_km: 10.0,
            hour: Some(14),
            day_of_week: Some(3),
            weather: Some(Weather::Unknown),
        })
        .await
        .unwrap();

    assert_eq!(prediction.method, PredictionMethod::FallbackEstimate);
    assert_eq!(prediction.method.to_string(), "fallback_estimate");
    assert_eq!(prediction.confidence, 30);
}

// Fifty consistently on-time trips: no delay probability, high reliability.
#[tokio::test]
async fn consistent_history_scores_reliable() {
    let records = (0..50).map(|_| zero_delay_record("route-7")).collect();
    let engine = engine_with_history(MemoryHistory::seeded(records));

    let stats = engine.delay_statistics("route-7", Some(9), Some(3), None).await.unwrap();

    assert!(stats.delay.probability_percentage.abs() < 1e-9);
    assert!(stats.reliability >= 90.0);
    assert_eq!(stats.sample_size, 50);
}

// An 8-minute overage raises a delay alert; a 3-minute one does not.
#[tokio::test]
async fn delay_alerts_fire_only_past_threshold() {
    let engine = engine();
    let mut watcher = engine.hub().connect().await;
    engine.hub().join(watcher.id(), &hub::bus_topic("BUS001")).await;

    assert!(engine.scheduler().check_and_send_delay("BUS001", 20.0, 28.0).await);
    let envelope = watcher.recv().await.unwrap();
    assert_eq!(envelope.event, "notification");
    assert_eq!(envelope.data["type"], "bus_delayed");

    assert!(!engine.scheduler().check_and_send_delay("BUS001", 20.0, 23.0).await);
    assert!(watcher.try_recv().is_none());
}

// Re-reporting an ETA re-arms the shared arrival timer instead of stacking
// a second one.
#[tokio::test]
async fn rearming_keeps_one_timer_per_device() {
    let engine = engine();
    let watcher = engine.hub().connect().await;
    engine.hub().join(watcher.id(), &hub::bus_topic("BUS001")).await;

    let t0 = Utc.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap();
    for (i, speed) in [(0_i64, 20.0), (1, 25.0)] {
        let mut report = TelemetryReport::for_device("BUS001");
        report.timestamp = Some(t0 + chrono::Duration::minutes(i));
        report.position = Some(LatLng::new(12.9700 + 0.0001 * (i as f64), 77.5900));
        report.destination = Some(LatLng::new(13.0500, 77.6800));
        report.speed = Some(speed);
        engine.report_telemetry(report).await.unwrap();
    }

    assert_eq!(engine.scheduler().active_count().await, 1);

    engine.shutdown().await;
    assert_eq!(engine.scheduler().active_count().await, 0);
}

// Boarding a full bus is rejected without touching the counters; alighting
// an empty one floors at zero.
#[tokio::test]
async fn passenger_counters_hold_their_bounds() {
    let engine = engine();
    let mut report = TelemetryReport::for_device("BUS001");
    report.total_capacity = Some(2);
    engine.report_telemetry(report).await.unwrap();

    engine.passenger_event("BUS001", PassengerAction::Board).await.unwrap();
    engine.passenger_event("BUS001", PassengerAction::Board).await.unwrap();

    let err = engine.passenger_event("BUS001", PassengerAction::Board).await.unwrap_err();
    assert!(matches!(err, Error::CapacityFull(_)));
    let state = engine.vehicle_state("BUS001").await.unwrap();
    assert_eq!(state.capacity.occupied, 2);

    engine.passenger_event("BUS001", PassengerAction::Alight).await.unwrap();
    engine.passenger_event("BUS001", PassengerAction::Alight).await.unwrap();
    let update = engine.passenger_event("BUS001", PassengerAction::Alight).await.unwrap();
    assert_eq!(update.occupied_seats, 0);
    assert_eq!(update.available_seats, 2);
}

#[tokio::test]
async fn unknown_device_eta_is_not_found() {
    let engine = engine();
    let err =
        engine.eta_to_destination("BUS404", LatLng::new(12.97, 77.59)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn out_of_order_report_is_rejected() {
    let engine = engine();
    let t0 = Utc.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap();

    let mut first = TelemetryReport::for_device("BUS001");
    first.timestamp = Some(t0);
    engine.report_telemetry(first).await.unwrap();

    let mut late = TelemetryReport::for_device("BUS001");
    late.timestamp = Some(t0 - chrono::Duration::seconds(30));
    let err = engine.report_telemetry(late).await.unwrap_err();
    assert!(matches!(err, Error::StaleReport(_)));
}

// Live location shares land on the state and expire by the grant clock.
#[tokio::test]
async fn live_location_sharing() {
    let engine = engine();
    engine.report_telemetry(TelemetryReport::for_device("BUS001")).await.unwrap();

    let grants = engine
        .share_live_location("BUS001", &["rider-1".to_string(), "rider-2".to_string()], 6)
        .await
        .unwrap();
    assert_eq!(grants.len(), 2);
    assert!(grants.iter().all(|grant| grant.expires_at > grant.shared_at));

    let err = engine.share_live_location("BUS001", &[], 6).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}

// Completed trips are recorded with early arrivals floored to zero delay,
// and immediately inform later predictions.
#[tokio::test]
async fn completed_trips_feed_history() {
    let engine = engine();

    let completion = trends::TripCompletion {
        route_id: "route-7".to_string(),
        day_of_week: 3,
        hour_of_day: 14,
        actual_duration_minutes: 27.0,
        expected_duration_minutes: 30.0,
        weather: Weather::Clear,
        traffic_rank: 2,
        distance_km: 10.0,
    };
    let record = engine.complete_trip(completion).await.unwrap();
    assert_eq!(record.delay_minutes, 0.0);

    let prediction = engine
        .predicted_eta(PredictionRequest {
            route_id: "route-7".to_string(),
            distance_km: 10.0,
            hour: Some(14),
            day_of_week: Some(3),
            weather: Some(Weather::Clear),
        })
        .await
        .unwrap();
    assert_eq!(prediction.method, PredictionMethod::HistoricalWeighted);
    assert_eq!(prediction.sample_size, 1);
}

// A slow-tracking consumer that disconnects simply misses events; the next
// publish carries on without it.
#[tokio::test]
async fn departed_watchers_do_not_block_updates() {
    let engine = engine();
    let watcher = engine.hub().connect().await;
    engine.hub().join(watcher.id(), &hub::bus_topic("BUS001")).await;
    drop(watcher);

    let mut report = TelemetryReport::for_device("BUS001");
    report.position = Some(LatLng::new(12.97, 77.59));
    let outcome = engine.report_telemetry(report).await.unwrap();

    assert_eq!(outcome.state.device_id, "BUS001");
    assert_eq!(engine.hub().members_of(&hub::bus_topic("BUS001")).await, 0);
}

// The document store failing must never block the live update path.
#[tokio::test]
async fn broken_doc_store_degrades_gracefully() {
    struct BrokenDocStore;

    #[async_trait]
    impl VehicleDocStore for BrokenDocStore {
        async fn fetch(&self, _device_id: &str) -> Result<Option<Vec<u8>>> {
            Err(anyhow::anyhow!("document store offline"))
        }

        async fn store(&self, _device_id: &str, _doc: &[u8]) -> Result<()> {
            Err(anyhow::anyhow!("document store offline"))
        }

        async fn delete(&self, _device_id: &str) -> Result<()> {
            Ok(())
        }
    }

    let engine = Engine::new(
        Config::from_env(),
        Arc::new(BrokenDocStore),
        Arc::new(MemoryHistory::default()),
        Arc::new(SystemClock),
    );

    let mut report = TelemetryReport::for_device("BUS001");
    report.position = Some(LatLng::new(12.97, 77.59));
    let outcome = engine.report_telemetry(report).await.unwrap();
    assert!(outcome.state.position.is_some());
}

// A slow history store must not delay prediction beyond the configured
// timeout; the result degrades to the fallback estimate.
#[tokio::test]
async fn slow_history_degrades_to_fallback() {
    struct SlowHistory;

    #[async_trait]
    impl TripHistoryStore for SlowHistory {
        async fn query(&self, _query: &HistoryQuery) -> Result<Vec<TripRecord>> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Vec::new())
        }

        async fn append(&self, _record: &TripRecord) -> Result<()> {
            Ok(())
        }
    }

    let mut config = Config::from_env();
    config.history_query_timeout = Duration::from_millis(50);
    let engine = Engine::new(
        config,
        Arc::new(MemoryDocStore::default()),
        Arc::new(SlowHistory),
        Arc::new(SystemClock),
    );

    let prediction = engine
        .predicted_eta(PredictionRequest {
            route_id: "route-7".to_string(),
            distance_km: 10.0,
            hour: Some(14),
            day_of_week: Some(3),
            weather: None,
        })
        .await
        .unwrap();
    assert_eq!(prediction.method, PredictionMethod::FallbackEstimate);
}
