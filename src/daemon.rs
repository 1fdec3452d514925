/// Periodic metrics refresh for all stations.
///
/// Each sweep:
/// 1. Lists active stations and classifies their metrics (absent/fresh/stale)
/// 2. Loads a measurement snapshot for every station that needs work
/// 3. Evaluates the snapshots in parallel on a thread pool
/// 4. Persists the new records sequentially on the daemon's connection
///
/// A failing station is logged and counted; it never aborts the sweep.

use chrono::{DateTime, Utc};
use std::sync::mpsc;
use threadpool::ThreadPool;

use crate::config::{DaemonSettings, EngineConfig};
use crate::engine::{evaluate, window_start};
use crate::model::{EngineError, Measurement, ResourceMetrics, StationGeometry};
use crate::monitor::MetricsService;
use crate::store::ResourceStore;

/// Outcome counts for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub fresh: usize,
    pub recomputed: usize,
    pub failed: usize,
}

impl RefreshSummary {
    pub fn total(&self) -> usize {
        self.fresh + self.recomputed + self.failed
    }
}

/// One station's input to the pool.
struct Snapshot {
    station: StationGeometry,
    window: Vec<Measurement>,
}

pub struct Daemon<S> {
    settings: DaemonSettings,
    service: MetricsService<S>,
    pool: ThreadPool,
}

impl<S: ResourceStore> Daemon<S> {
    pub fn new(store: S, engine: EngineConfig, settings: DaemonSettings) -> Self {
        let pool = ThreadPool::with_name("gwres-eval".to_string(), settings.worker_threads.max(1));
        Self {
            settings,
            service: MetricsService::new(store, engine),
            pool,
        }
    }

    pub fn service_mut(&mut self) -> &mut MetricsService<S> {
        &mut self.service
    }

    /// Runs one sweep over every active station as of `now`.
    pub fn refresh_all(&mut self, now: DateTime<Utc>) -> Result<RefreshSummary, EngineError> {
        let mut summary = RefreshSummary::default();
        let stations = self.service.store_mut().stations()?;
        let period_days = self.service.config().period_days;

        let mut snapshots = Vec::new();
        for station in stations {
            let station_id = station.station_id.clone();
            match self.load_snapshot(station, now, period_days) {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => summary.fresh += 1,
                Err(e) => {
                    tracing::error!(station_id = %station_id, error = %e, "failed to load station snapshot");
                    summary.failed += 1;
                }
            }
        }

        if snapshots.is_empty() {
            return Ok(summary);
        }

        for (station_id, result) in self.evaluate_parallel(snapshots, now) {
            let saved = result.and_then(|metrics| {
                self.service.store_mut().save_metrics(&metrics)?;
                Ok(metrics)
            });
            match saved {
                Ok(metrics) => {
                    tracing::info!(
                        station_id = %station_id,
                        alert_status = %metrics.alert_status,
                        trend = %metrics.trend,
                        "metrics recomputed"
                    );
                    summary.recomputed += 1;
                }
                Err(e) => {
                    tracing::error!(station_id = %station_id, error = %e, "station evaluation failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// `None` when the station's metrics are fresh.
    fn load_snapshot(
        &mut self,
        station: StationGeometry,
        now: DateTime<Utc>,
        period_days: i64,
    ) -> Result<Option<Snapshot>, EngineError> {
        let state = self.service.state_of(&station.station_id, now)?;
        if !state.needs_recompute() {
            tracing::debug!(station_id = %station.station_id, "metrics fresh");
            return Ok(None);
        }

        tracing::debug!(station_id = %station.station_id, %state, "metrics need recompute");
        let window = self.service.store_mut().measurements_between(
            &station.station_id,
            window_start(now, period_days),
            now,
        )?;
        Ok(Some(Snapshot { station, window }))
    }

    fn evaluate_parallel(
        &self,
        snapshots: Vec<Snapshot>,
        now: DateTime<Utc>,
    ) -> Vec<(String, Result<ResourceMetrics, EngineError>)> {
        let (tx, rx) = mpsc::channel();
        let jobs = snapshots.len();

        for snapshot in snapshots {
            let tx = tx.clone();
            let config = self.service.config().clone();
            self.pool.execute(move || {
                let result = evaluate(&snapshot.station, &snapshot.window, now, &config);
                // Receiver outlives every job; a send error means the sweep was abandoned.
                let _ = tx.send((snapshot.station.station_id, result));
            });
        }
        drop(tx);

        let mut results: Vec<_> = rx.iter().take(jobs).collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// Main daemon loop (runs indefinitely)
    pub fn run(&mut self) -> Result<(), EngineError> {
        tracing::info!(
            poll_interval_minutes = self.settings.poll_interval_minutes,
            worker_threads = self.settings.worker_threads,
            "starting refresh loop"
        );

        loop {
            let start = Utc::now();

            match self.refresh_all(start) {
                Ok(summary) => tracing::info!(
                    stations = summary.total(),
                    fresh = summary.fresh,
                    recomputed = summary.recomputed,
                    failed = summary.failed,
                    "refresh sweep complete"
                ),
                Err(e) => tracing::error!(error = %e, "refresh sweep failed"),
            }

            // Sleep until next poll interval
            let elapsed = (Utc::now() - start).num_seconds();
            let sleep_seconds = (self.settings.poll_interval_minutes * 60) as i64 - elapsed;

            if sleep_seconds > 0 {
                std::thread::sleep(std::time::Duration::from_secs(sleep_seconds as u64));
            }
        }
    }
}
