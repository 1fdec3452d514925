/// Storage collaborator for the evaluation engine.
///
/// The engine itself never touches storage. Everything around it (the
/// metrics service, the daemon, the HTTP endpoint) talks to a
/// [`ResourceStore`], which supplies station geometry and measurement
/// windows and keeps the append-only history of metrics records.
///
/// Two implementations exist:
/// - [`MemoryStore`]: in-process, used by tests and one-off tooling.
/// - `db::PgStore`: PostgreSQL, used by the daemon.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::db::DbConfigError;
use crate::model::{AlertStatus, Measurement, ResourceMetrics, StationGeometry};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    #[error(transparent)]
    Connection(#[from] DbConfigError),

    #[error("station not found: {0}")]
    StationNotFound(String),

    /// A stored row could not be mapped back onto the domain model.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

pub trait ResourceStore {
    /// Geometry for one station, if registered.
    fn station(&mut self, station_id: &str) -> Result<Option<StationGeometry>, StoreError>;

    /// All active stations.
    fn stations(&mut self) -> Result<Vec<StationGeometry>, StoreError>;

    /// Readings in `[start, end]`, chronological; same-timestamp readings in
    /// ingestion order.
    fn measurements_between(
        &mut self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, StoreError>;

    /// Timestamp of the newest reading for the station.
    fn latest_measurement_time(&mut self, station_id: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// The authoritative (latest by `calculation_date`) metrics record.
    fn latest_metrics(&mut self, station_id: &str) -> Result<Option<ResourceMetrics>, StoreError>;

    /// Every record for a station, newest first (the order `latest_metrics`
    /// resolves by), optionally restricted to one alert status.
    fn list_metrics(
        &mut self,
        station_id: &str,
        alert_status: Option<AlertStatus>,
    ) -> Result<Vec<ResourceMetrics>, StoreError>;

    /// Appends a metrics record. Records are never updated in place.
    fn save_metrics(&mut self, metrics: &ResourceMetrics) -> Result<(), StoreError>;

    /// Tries to take the per-station recompute lock. Returning `false` means
    /// someone else is recomputing; callers may proceed anyway.
    fn try_lock_station(&mut self, _station_id: &str) -> Result<bool, StoreError> {
        Ok(true)
    }

    fn unlock_station(&mut self, _station_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Metrics record plus its insertion sequence number, the tie-break when two
/// records share a `calculation_date`.
#[derive(Debug, Clone)]
struct StoredMetrics {
    seq: u64,
    metrics: ResourceMetrics,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    stations: HashMap<String, StationGeometry>,
    measurements: HashMap<String, Vec<Measurement>>,
    metrics: HashMap<String, Vec<StoredMetrics>>,
    next_seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_station(&mut self, station: StationGeometry) {
        self.stations.insert(station.station_id.clone(), station);
    }

    /// Appends a reading, keeping the per-station list chronological while
    /// preserving ingestion order among equal timestamps.
    pub fn insert_measurement(&mut self, measurement: Measurement) {
        let list = self.measurements.entry(measurement.station_id.clone()).or_default();
        let pos = list.partition_point(|m| m.timestamp <= measurement.timestamp);
        list.insert(pos, measurement);
    }

    pub fn insert_measurements(&mut self, measurements: impl IntoIterator<Item = Measurement>) {
        for m in measurements {
            self.insert_measurement(m);
        }
    }

    /// Every saved record for a station, in insertion order.
    pub fn metrics_history(&self, station_id: &str) -> Vec<ResourceMetrics> {
        self.metrics
            .get(station_id)
            .map(|records| records.iter().map(|r| r.metrics.clone()).collect())
            .unwrap_or_default()
    }
}

impl ResourceStore for MemoryStore {
    fn station(&mut self, station_id: &str) -> Result<Option<StationGeometry>, StoreError> {
        Ok(self.stations.get(station_id).cloned())
    }

    fn stations(&mut self) -> Result<Vec<StationGeometry>, StoreError> {
        let mut all: Vec<StationGeometry> = self.stations.values().cloned().collect();
        all.sort_by(|a, b| a.station_id.cmp(&b.station_id));
        Ok(all)
    }

    fn measurements_between(
        &mut self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, StoreError> {
        Ok(self
            .measurements
            .get(station_id)
            .map(|list| {
                list.iter()
                    .filter(|m| m.timestamp >= start && m.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn latest_measurement_time(&mut self, station_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .measurements
            .get(station_id)
            .and_then(|list| list.last())
            .map(|m| m.timestamp))
    }

    fn latest_metrics(&mut self, station_id: &str) -> Result<Option<ResourceMetrics>, StoreError> {
        Ok(self
            .metrics
            .get(station_id)
            .and_then(|records| {
                records
                    .iter()
                    .max_by_key(|r| (r.metrics.calculation_date, r.seq))
            })
            .map(|r| r.metrics.clone()))
    }

    fn list_metrics(
        &mut self,
        station_id: &str,
        alert_status: Option<AlertStatus>,
    ) -> Result<Vec<ResourceMetrics>, StoreError> {
        let mut records: Vec<&StoredMetrics> = self
            .metrics
            .get(station_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| alert_status.is_none_or(|s| r.metrics.alert_status == s))
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(|r| std::cmp::Reverse((r.metrics.calculation_date, r.seq)));
        Ok(records.into_iter().map(|r| r.metrics.clone()).collect())
    }

    fn save_metrics(&mut self, metrics: &ResourceMetrics) -> Result<(), StoreError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.metrics
            .entry(metrics.station_id.clone())
            .or_default()
            .push(StoredMetrics {
                seq,
                metrics: metrics.clone(),
            });
        Ok(())
    }
}
