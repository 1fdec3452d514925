/// On-demand metrics with staleness-driven recomputation.
///
/// ## Flow
///
/// 1. Look up the station's geometry (unknown station → `StationNotFound`)
/// 2. Read the latest metrics record and the newest measurement time
/// 3. Classify with `alert::staleness::metrics_state`
/// 4. `Fresh` → return the cached record untouched
/// 5. `Absent` / `Stale` → pull the window, `engine::evaluate`, append the
///    new record, return it
///
/// Concurrent recomputes for one station are harmless (each appends a
/// record and the store resolves "latest" deterministically), so the
/// per-station advisory lock is only there to skip duplicate work. When the
/// lock is held elsewhere and a cached record exists, the cached record is
/// served; with nothing cached the computation goes ahead regardless.

use chrono::{DateTime, Utc};

use crate::alert::insights::{Insight, insights};
use crate::alert::staleness::{MetricsState, metrics_state};
use crate::alert::thresholds::{AlertSummary, summarize};
use crate::config::EngineConfig;
use crate::engine::{evaluate, window_start};
use crate::model::{AlertStatus, EngineError, ResourceMetrics, StationGeometry};
use crate::store::{ResourceStore, StoreError};

/// What `metrics_for` returned and why.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsOutcome {
    pub metrics: ResourceMetrics,
    /// State of the station's metrics before this request.
    pub prior_state: MetricsState,
    pub recomputed: bool,
}

pub struct MetricsService<S> {
    store: S,
    config: EngineConfig,
}

impl<S: ResourceStore> MetricsService<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn require_station(&mut self, station_id: &str) -> Result<StationGeometry, EngineError> {
        self.store
            .station(station_id)?
            .ok_or_else(|| StoreError::StationNotFound(station_id.to_string()).into())
    }

    /// Current freshness of a station's metrics.
    pub fn state_of(&mut self, station_id: &str, now: DateTime<Utc>) -> Result<MetricsState, EngineError> {
        let latest = self.store.latest_metrics(station_id)?;
        let last_reading = self.store.latest_measurement_time(station_id)?;
        Ok(metrics_state(latest.as_ref(), last_reading, now, self.config.period_days))
    }

    /// Returns authoritative metrics for a station, recomputing if needed.
    pub fn metrics_for(&mut self, station_id: &str, now: DateTime<Utc>) -> Result<MetricsOutcome, EngineError> {
        let station = self.require_station(station_id)?;
        let latest = self.store.latest_metrics(station_id)?;
        let last_reading = self.store.latest_measurement_time(station_id)?;
        let state = metrics_state(latest.as_ref(), last_reading, now, self.config.period_days);

        let cached = match (state, latest) {
            (MetricsState::Fresh, Some(metrics)) => {
                tracing::debug!(station_id, "metrics fresh, serving cached record");
                return Ok(MetricsOutcome {
                    metrics,
                    prior_state: state,
                    recomputed: false,
                });
            }
            (_, latest) => latest,
        };

        let locked = self.store.try_lock_station(station_id)?;
        if !locked {
            if let Some(metrics) = cached {
                tracing::info!(station_id, %state, "recompute already in progress, serving cached record");
                return Ok(MetricsOutcome {
                    metrics,
                    prior_state: state,
                    recomputed: false,
                });
            }
        }

        let result = self.recompute(&station, now);

        if locked {
            if let Err(e) = self.store.unlock_station(station_id) {
                tracing::warn!(station_id, error = %e, "failed to release station lock");
            }
        }

        let metrics = result?;
        tracing::info!(
            station_id,
            %state,
            alert_status = %metrics.alert_status,
            trend = %metrics.trend,
            measurements = metrics.measurement_count,
            "metrics recomputed"
        );

        Ok(MetricsOutcome {
            metrics,
            prior_state: state,
            recomputed: true,
        })
    }

    /// Evaluates and persists unconditionally.
    pub fn recompute(&mut self, station: &StationGeometry, now: DateTime<Utc>) -> Result<ResourceMetrics, EngineError> {
        let start = window_start(now, self.config.period_days);
        let window = self.store.measurements_between(&station.station_id, start, now)?;
        let metrics = evaluate(station, &window, now, &self.config)?;
        self.store.save_metrics(&metrics)?;
        Ok(metrics)
    }

    /// Latest stored record for every active station that has one. Does not
    /// recompute.
    pub fn latest_for_all(&mut self) -> Result<Vec<ResourceMetrics>, EngineError> {
        let stations = self.store.stations()?;
        let mut latest = Vec::with_capacity(stations.len());
        for station in stations {
            if let Some(m) = self.store.latest_metrics(&station.station_id)? {
                latest.push(m);
            }
        }
        Ok(latest)
    }

    /// Alert counts over the latest stored records. Does not recompute.
    pub fn alert_summary(&mut self) -> Result<AlertSummary, EngineError> {
        Ok(summarize(&self.latest_for_all()?))
    }

    /// Decision-support insights over the latest stored records.
    pub fn insights(&mut self) -> Result<Vec<Insight>, EngineError> {
        let active = self.store.stations()?.len();
        let summary = self.alert_summary()?;
        Ok(insights(&summary, active))
    }

    /// Stored records for a known station, newest first.
    pub fn history(
        &mut self,
        station_id: &str,
        alert_status: Option<AlertStatus>,
    ) -> Result<Vec<ResourceMetrics>, EngineError> {
        self.require_station(station_id)?;
        Ok(self.store.list_metrics(station_id, alert_status)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::staleness::StaleReason;
    use crate::alert::insights::InsightPriority;
    use crate::model::Measurement;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap()
    }

    fn reading(days_ago: i64, depth: f64) -> Measurement {
        Measurement {
            station_id: "STN1001".to_string(),
            timestamp: fixed_now() - Duration::days(days_ago),
            depth_below_ground_m: depth,
        }
    }

    fn service_with(readings: Vec<Measurement>) -> MetricsService<MemoryStore> {
        let mut store = MemoryStore::new();
        store.insert_station(StationGeometry {
            station_id: "STN1001".to_string(),
            well_depth_m: 50.0,
            specific_yield: 0.15,
            elevation_m: None,
            representative_area_m2: Some(10_000.0),
        });
        store.insert_measurements(readings);
        MetricsService::new(store, EngineConfig::default())
    }

    /// Store whose advisory lock is always held by someone else.
    struct Contended(MemoryStore);

    impl ResourceStore for Contended {
        fn station(&mut self, id: &str) -> Result<Option<StationGeometry>, StoreError> {
            self.0.station(id)
        }
        fn stations(&mut self) -> Result<Vec<StationGeometry>, StoreError> {
            self.0.stations()
        }
        fn measurements_between(
            &mut self,
            id: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Measurement>, StoreError> {
            self.0.measurements_between(id, start, end)
        }
        fn latest_measurement_time(&mut self, id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
            self.0.latest_measurement_time(id)
        }
        fn latest_metrics(&mut self, id: &str) -> Result<Option<ResourceMetrics>, StoreError> {
            self.0.latest_metrics(id)
        }
        fn list_metrics(
            &mut self,
            id: &str,
            status: Option<AlertStatus>,
        ) -> Result<Vec<ResourceMetrics>, StoreError> {
            self.0.list_metrics(id, status)
        }
        fn save_metrics(&mut self, m: &ResourceMetrics) -> Result<(), StoreError> {
            self.0.save_metrics(m)
        }
        fn try_lock_station(&mut self, _id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[test]
    fn test_absent_metrics_are_computed_and_saved() {
        let mut service = service_with(vec![reading(30, 6.0), reading(1, 5.0)]);
        let outcome = service.metrics_for("STN1001", fixed_now()).unwrap();

        assert!(outcome.recomputed);
        assert_eq!(outcome.prior_state, MetricsState::Absent);
        assert_eq!(service.store_mut().metrics_history("STN1001").len(), 1);
    }

    #[test]
    fn test_fresh_metrics_are_served_without_recompute() {
        let mut service = service_with(vec![reading(30, 6.0), reading(1, 5.0)]);
        let first = service.metrics_for("STN1001", fixed_now()).unwrap();
        let second = service
            .metrics_for("STN1001", fixed_now() + Duration::days(3))
            .unwrap();

        assert!(!second.recomputed);
        assert_eq!(second.prior_state, MetricsState::Fresh);
        assert_eq!(second.metrics, first.metrics);
        assert_eq!(service.store_mut().metrics_history("STN1001").len(), 1);
    }

    #[test]
    fn test_new_measurement_triggers_recompute() {
        let mut service = service_with(vec![reading(30, 6.0), reading(1, 5.0)]);
        service.metrics_for("STN1001", fixed_now()).unwrap();

        let later = fixed_now() + Duration::days(2);
        let new_reading = Measurement {
            station_id: "STN1001".to_string(),
            timestamp: fixed_now() + Duration::days(1),
            depth_below_ground_m: 45.0,
        };
        service.store_mut().insert_measurement(new_reading.clone());

        let outcome = service.metrics_for("STN1001", later).unwrap();
        assert!(outcome.recomputed);
        assert_eq!(
            outcome.prior_state,
            MetricsState::Stale(StaleReason::NewerMeasurement { measured_at: new_reading.timestamp })
        );
        assert_eq!(outcome.metrics.alert_status, AlertStatus::Critical);
        assert_eq!(service.store_mut().metrics_history("STN1001").len(), 2);
    }

    #[test]
    fn test_period_expiry_triggers_recompute() {
        let mut service = service_with(vec![reading(30, 6.0)]);
        service.metrics_for("STN1001", fixed_now()).unwrap();

        let outcome = service
            .metrics_for("STN1001", fixed_now() + Duration::days(400))
            .unwrap();
        assert!(outcome.recomputed);
        assert!(matches!(outcome.prior_state, MetricsState::Stale(StaleReason::PeriodElapsed { .. })));
    }

    #[test]
    fn test_unknown_station_is_not_found() {
        let mut service = service_with(vec![]);
        let result = service.metrics_for("STN9999", fixed_now());
        assert!(matches!(result, Err(EngineError::Store(StoreError::StationNotFound(_)))));
    }

    #[test]
    fn test_contended_lock_serves_cached_record() {
        let mut service = service_with(vec![reading(30, 6.0)]);
        service.metrics_for("STN1001", fixed_now()).unwrap();
        let store = service.into_store();

        let mut contended = MetricsService::new(Contended(store), EngineConfig::default());
        let outcome = contended
            .metrics_for("STN1001", fixed_now() + Duration::days(400))
            .unwrap();
        assert!(!outcome.recomputed);
    }

    #[test]
    fn test_contended_lock_without_cache_still_computes() {
        let service = service_with(vec![reading(30, 6.0)]);
        let mut contended = MetricsService::new(Contended(service.into_store()), EngineConfig::default());
        let outcome = contended.metrics_for("STN1001", fixed_now()).unwrap();
        assert!(outcome.recomputed);
    }

    #[test]
    fn test_history_lists_every_recompute_newest_first() {
        let mut service = service_with(vec![reading(30, 6.0)]);
        service.metrics_for("STN1001", fixed_now()).unwrap();
        service.metrics_for("STN1001", fixed_now() + Duration::days(400)).unwrap();

        let history = service.history("STN1001", None).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].calculation_date > history[1].calculation_date);

        let good = service.history("STN1001", Some(AlertStatus::Good)).unwrap();
        assert_eq!(good.len(), 1);
        assert_eq!(good[0].calculation_date, fixed_now());

        assert!(matches!(
            service.history("STN9999", None),
            Err(EngineError::Store(StoreError::StationNotFound(_)))
        ));
    }

    #[test]
    fn test_insights_report_pending_then_stress() {
        let mut service = service_with(vec![reading(2, 45.0)]);
        let pending = service.insights().unwrap();
        assert_eq!(pending[0].title, "Resource evaluation pending");

        service.metrics_for("STN1001", fixed_now()).unwrap();
        let stressed = service.insights().unwrap();
        assert_eq!(stressed[0].priority, InsightPriority::High);
        assert_eq!(stressed.len(), 1);
    }

    #[test]
    fn test_latest_for_all_skips_stations_without_metrics() {
        let mut service = service_with(vec![reading(10, 6.0)]);
        assert!(service.latest_for_all().unwrap().is_empty());
        service.metrics_for("STN1001", fixed_now()).unwrap();
        assert_eq!(service.latest_for_all().unwrap().len(), 1);
    }
}
