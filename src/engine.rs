/// Resource evaluation engine: turns a station's depth series into one
/// `ResourceMetrics` record.
///
/// # Pipeline
///
/// 1. **Window**: keep finite readings in `[now − period_days, now]`, order
///    them, and collapse duplicate timestamps (last ingested wins).
/// 2. **Estimate**: trend, recharge, and storage run independently on the
///    window.
/// 3. **Classify**: storage percentage + trend → alert status.
/// 4. **Emit**: a new immutable record stamped with `now`.
///
/// `evaluate` does no I/O and has no hidden inputs: the same snapshot and
/// the same `now` always produce the same record. Persisting the record and
/// deciding *when* to evaluate are the caller's job (see `monitor`).

use chrono::{DateTime, TimeDelta, Utc};

use crate::alert::thresholds::{AlertInput, classify_alert};
use crate::analysis::recharge::estimate_recharge;
use crate::analysis::storage::{calculate_storage, validate_geometry};
use crate::analysis::trend::estimate_trend;
use crate::config::EngineConfig;
use crate::model::{
    AlertStatus, DataQuality, EngineError, Measurement, ResourceMetrics, StationGeometry, Trend,
    dedup_latest,
};

/// Start of the evaluation window ending at `now`. Saturates at the
/// earliest representable instant.
pub fn window_start(now: DateTime<Utc>, period_days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(period_days)
        .and_then(|period| now.checked_sub_signed(period))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Evaluates one station.
///
/// `measurements` should be the station's chronologically ordered history
/// (or any superset of the window); readings outside the window or for
/// another station are ignored.
///
/// # Errors
/// Only `InvalidGeometry`. An empty window is not an error: the record is
/// returned with `data_quality == InsufficientData`, a stable trend, zero
/// recharge, no storage figures, and a `normal` alert. Non-finite depths
/// are dropped from the window and flagged as `DiscardedReadings`.
pub fn evaluate(
    station: &StationGeometry,
    measurements: &[Measurement],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<ResourceMetrics, EngineError> {
    validate_geometry(station)?;

    let period_start = window_start(now, config.period_days);
    let (mut window, discarded): (Vec<Measurement>, Vec<Measurement>) = measurements
        .iter()
        .filter(|m| m.station_id == station.station_id)
        .filter(|m| m.timestamp >= period_start && m.timestamp <= now)
        .cloned()
        .partition(|m| m.depth_below_ground_m.is_finite());
    if !discarded.is_empty() {
        tracing::warn!(
            station_id = %station.station_id,
            discarded = discarded.len(),
            "dropping non-finite depth readings from evaluation window"
        );
    }
    // Stable, so duplicate timestamps keep their ingestion order.
    window.sort_by_key(|m| m.timestamp);
    let points = dedup_latest(&window);

    let latest = match points.last() {
        Some(p) => *p,
        None => {
            tracing::warn!(
                station_id = %station.station_id,
                period_days = config.period_days,
                "no readings in evaluation window, emitting degraded record"
            );
            return Ok(insufficient_data_record(station, period_start, now));
        }
    };

    let trend = estimate_trend(&points, &config.trend);
    let recharge = estimate_recharge(&points, station);
    let storage = calculate_storage(station, latest.depth_m)?;

    let alert_status = classify_alert(
        &station.station_id,
        &AlertInput {
            storage_percentage: Some(storage.storage_percentage),
            current_depth_m: Some(latest.depth_m),
            well_depth_m: Some(station.well_depth_m),
            trend: trend.trend,
        },
        &config.alert,
    )?;

    let data_quality = if storage.clamped {
        tracing::warn!(
            station_id = %station.station_id,
            depth_m = latest.depth_m,
            well_depth_m = station.well_depth_m,
            "latest depth outside [0, well_depth], storage clamped"
        );
        DataQuality::ClampedInput
    } else if !discarded.is_empty() {
        DataQuality::DiscardedReadings
    } else {
        DataQuality::Complete
    };

    Ok(ResourceMetrics {
        station_id: station.station_id.clone(),
        calculation_date: now,
        period_start,
        period_end: now,
        estimated_recharge_m3: recharge.estimated_recharge_m3,
        recharge_volume_available: recharge.volume_available,
        recharge_rate_mm_per_year: recharge.recharge_rate_mm_per_year,
        current_storage_m3: storage.current_storage_m3,
        available_storage_capacity_m3: storage.available_capacity_m3,
        storage_percentage: Some(storage.storage_percentage),
        current_depth_m: Some(latest.depth_m),
        water_level_elevation_m: station.elevation_m.map(|e| e - latest.depth_m),
        trend: trend.trend,
        trend_magnitude_m_per_year: trend.magnitude_m_per_year,
        alert_status,
        data_quality,
        measurement_count: points.len(),
    })
}

fn insufficient_data_record(
    station: &StationGeometry,
    period_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ResourceMetrics {
    ResourceMetrics {
        station_id: station.station_id.clone(),
        calculation_date: now,
        period_start,
        period_end: now,
        estimated_recharge_m3: 0.0,
        recharge_volume_available: station.representative_area_m2.is_some(),
        recharge_rate_mm_per_year: 0.0,
        current_storage_m3: None,
        available_storage_capacity_m3: None,
        storage_percentage: None,
        current_depth_m: None,
        water_level_elevation_m: None,
        trend: Trend::Stable,
        trend_magnitude_m_per_year: 0.0,
        alert_status: AlertStatus::Normal,
        data_quality: DataQuality::InsufficientData,
        measurement_count: 0,
    }
}
