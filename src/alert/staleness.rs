/// Metrics record staleness detection.
///
/// A station's metrics move through three states:
///
/// ```text
///   Absent ──evaluate──▶ Fresh ──time passes / new reading──▶ Stale
///                          ▲                                   │
///                          └────────────evaluate───────────────┘
/// ```
///
/// A record is stale once it is strictly older than the evaluation period,
/// or once a measurement newer than its `calculation_date` exists.
///
/// # Clock injection
/// All functions take `now` rather than calling `Utc::now()`, keeping the
/// state machine deterministic in tests.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::model::ResourceMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The record is older than the evaluation period.
    PeriodElapsed { age_days: i64 },
    /// A reading arrived after the record was computed.
    NewerMeasurement { measured_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsState {
    Absent,
    Fresh,
    Stale(StaleReason),
}

impl MetricsState {
    pub fn needs_recompute(&self) -> bool {
        !matches!(self, MetricsState::Fresh)
    }
}

impl fmt::Display for MetricsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsState::Absent => write!(f, "absent"),
            MetricsState::Fresh => write!(f, "fresh"),
            MetricsState::Stale(StaleReason::PeriodElapsed { age_days }) => {
                write!(f, "stale ({} days old)", age_days)
            }
            MetricsState::Stale(StaleReason::NewerMeasurement { measured_at }) => {
                write!(f, "stale (newer reading at {})", measured_at.to_rfc3339())
            }
        }
    }
}

/// Determines the state of `latest` relative to `now` and the newest
/// measurement on record for the station.
pub fn metrics_state(
    latest: Option<&ResourceMetrics>,
    latest_measurement_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    period_days: i64,
) -> MetricsState {
    let metrics = match latest {
        Some(m) => m,
        None => return MetricsState::Absent,
    };

    let age = now - metrics.calculation_date;
    if age > Duration::days(period_days) {
        return MetricsState::Stale(StaleReason::PeriodElapsed {
            age_days: age.num_days(),
        });
    }

    if let Some(measured_at) = latest_measurement_at {
        if measured_at > metrics.calculation_date {
            return MetricsState::Stale(StaleReason::NewerMeasurement { measured_at });
        }
    }

    MetricsState::Fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertStatus, DataQuality, Trend};
    use chrono::TimeZone;

    /// A fixed "now" used across all tests: 2024-06-01 12:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn computed_at(at: DateTime<Utc>) -> ResourceMetrics {
        ResourceMetrics {
            station_id: "STN1001".to_string(),
            calculation_date: at,
            period_start: at - Duration::days(365),
            period_end: at,
            estimated_recharge_m3: 0.0,
            recharge_volume_available: false,
            recharge_rate_mm_per_year: 0.0,
            current_storage_m3: None,
            available_storage_capacity_m3: None,
            storage_percentage: Some(90.0),
            current_depth_m: Some(5.0),
            water_level_elevation_m: None,
            trend: Trend::Stable,
            trend_magnitude_m_per_year: 0.0,
            alert_status: AlertStatus::Good,
            data_quality: DataQuality::Complete,
            measurement_count: 12,
        }
    }

    #[test]
    fn test_no_record_is_absent() {
        let state = metrics_state(None, Some(fixed_now()), fixed_now(), 365);
        assert_eq!(state, MetricsState::Absent);
        assert!(state.needs_recompute());
    }

    #[test]
    fn test_recent_record_without_newer_reading_is_fresh() {
        let m = computed_at(fixed_now() - Duration::days(10));
        let last_reading = fixed_now() - Duration::days(11);
        let state = metrics_state(Some(&m), Some(last_reading), fixed_now(), 365);
        assert_eq!(state, MetricsState::Fresh);
        assert!(!state.needs_recompute());
    }

    #[test]
    fn test_record_exactly_at_period_is_not_stale() {
        let m = computed_at(fixed_now() - Duration::days(365));
        assert_eq!(metrics_state(Some(&m), None, fixed_now(), 365), MetricsState::Fresh);
    }

    #[test]
    fn test_record_older_than_period_is_stale() {
        let m = computed_at(fixed_now() - Duration::days(366));
        let state = metrics_state(Some(&m), None, fixed_now(), 365);
        assert_eq!(state, MetricsState::Stale(StaleReason::PeriodElapsed { age_days: 366 }));
    }

    #[test]
    fn test_newer_measurement_makes_record_stale() {
        let m = computed_at(fixed_now() - Duration::days(2));
        let measured_at = fixed_now() - Duration::days(1);
        let state = metrics_state(Some(&m), Some(measured_at), fixed_now(), 365);
        assert_eq!(state, MetricsState::Stale(StaleReason::NewerMeasurement { measured_at }));
    }

    #[test]
    fn test_measurement_at_calculation_time_is_not_newer() {
        let at = fixed_now() - Duration::days(2);
        let m = computed_at(at);
        assert_eq!(metrics_state(Some(&m), Some(at), fixed_now(), 365), MetricsState::Fresh);
    }

    #[test]
    fn test_shorter_period_expires_sooner() {
        let m = computed_at(fixed_now() - Duration::days(40));
        assert!(metrics_state(Some(&m), None, fixed_now(), 30).needs_recompute());
        assert!(!metrics_state(Some(&m), None, fixed_now(), 365).needs_recompute());
    }
}
