//! Storage-band alert classification.
//!
//! The primary input is the storage percentage. When that is unavailable the
//! classifier falls back to a depth-based proxy, `(1 − depth / well_depth) × 100`,
//! banded with the same thresholds. A falling water table at `normal` is
//! downgraded to `warning`; no other band is touched by the trend.

use serde::Serialize;

use crate::config::AlertThresholds;
use crate::model::{AlertStatus, EngineError, ResourceMetrics, Trend};

/// Everything the classifier may look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertInput {
    pub storage_percentage: Option<f64>,
    pub current_depth_m: Option<f64>,
    pub well_depth_m: Option<f64>,
    pub trend: Trend,
}

/// Maps a percentage onto the four bands. Bounds are half-open, so a value
/// exactly on a bound lands in the higher (safer) band.
pub fn band_for_percentage(percentage: f64, thresholds: &AlertThresholds) -> AlertStatus {
    if percentage < thresholds.warning_from {
        AlertStatus::Critical
    } else if percentage < thresholds.normal_from {
        AlertStatus::Warning
    } else if percentage < thresholds.good_from {
        AlertStatus::Normal
    } else {
        AlertStatus::Good
    }
}

/// Applies the falling-trend modifier to a band.
pub fn apply_trend(band: AlertStatus, trend: Trend, thresholds: &AlertThresholds) -> AlertStatus {
    match (band, trend) {
        (AlertStatus::Normal, Trend::Falling) if thresholds.downgrade_normal_on_falling => AlertStatus::Warning,
        _ => band,
    }
}

/// Classifies a station. Fails with `InsufficientData` only when there is
/// neither a usable percentage nor a depth/well-depth pair to derive one.
pub fn classify_alert(
    station_id: &str,
    input: &AlertInput,
    thresholds: &AlertThresholds,
) -> Result<AlertStatus, EngineError> {
    let percentage = match input.storage_percentage.filter(|p| p.is_finite()) {
        Some(p) => p,
        None => depth_proxy_percentage(station_id, input)?,
    };

    let band = band_for_percentage(percentage, thresholds);
    Ok(apply_trend(band, input.trend, thresholds))
}

fn depth_proxy_percentage(station_id: &str, input: &AlertInput) -> Result<f64, EngineError> {
    let (depth, well_depth) = match (input.current_depth_m, input.well_depth_m) {
        (Some(d), Some(w)) if d.is_finite() => (d, w),
        _ => {
            return Err(EngineError::InsufficientData {
                station_id: station_id.to_string(),
            });
        }
    };

    if !well_depth.is_finite() || well_depth <= 0.0 {
        return Err(EngineError::InvalidGeometry {
            station_id: station_id.to_string(),
            reason: format!("well depth must be positive, got {}", well_depth),
        });
    }

    Ok(((1.0 - depth / well_depth) * 100.0).clamp(0.0, 100.0))
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// A station that needs attention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationAlert {
    pub station_id: String,
    pub alert_status: AlertStatus,
    pub storage_percentage: Option<f64>,
    pub trend: Trend,
}

/// Alert counts across a set of stations' latest metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub normal: usize,
    pub good: usize,
    /// Critical and warning stations, worst first, then by storage.
    pub attention: Vec<StationAlert>,
}

pub fn summarize<'a>(latest: impl IntoIterator<Item = &'a ResourceMetrics>) -> AlertSummary {
    let mut summary = AlertSummary::default();

    for m in latest {
        summary.total += 1;
        match m.alert_status {
            AlertStatus::Critical => summary.critical += 1,
            AlertStatus::Warning => summary.warning += 1,
            AlertStatus::Normal => summary.normal += 1,
            AlertStatus::Good => summary.good += 1,
        }
        if m.alert_status <= AlertStatus::Warning {
            summary.attention.push(StationAlert {
                station_id: m.station_id.clone(),
                alert_status: m.alert_status,
                storage_percentage: m.storage_percentage,
                trend: m.trend,
            });
        }
    }

    summary.attention.sort_by(|a, b| {
        a.alert_status
            .cmp(&b.alert_status)
            .then_with(|| {
                let pa = a.storage_percentage.unwrap_or(f64::INFINITY);
                let pb = b.storage_percentage.unwrap_or(f64::INFINITY);
                pa.total_cmp(&pb)
            })
            .then_with(|| a.station_id.cmp(&b.station_id))
    });

    summary
}
