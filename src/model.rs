/// Core data types for the groundwater resource evaluation service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O: only types, a few conversions, and the engine's
/// error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

// ---------------------------------------------------------------------------
// Station geometry
// ---------------------------------------------------------------------------

/// The parts of a monitoring station's record the engine needs for storage
/// math. Owned by the station registry; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationGeometry {
    pub station_id: String,
    /// Total well depth below ground, in meters. Must be > 0.
    pub well_depth_m: f64,
    /// Drainable fraction of aquifer volume, 0–1.
    pub specific_yield: f64,
    /// Ground elevation in meters, if surveyed.
    pub elevation_m: Option<f64>,
    /// Area the well is taken to represent, in m². `None` puts storage and
    /// recharge into percentage/rate-only mode.
    pub representative_area_m2: Option<f64>,
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

/// A single depth-to-water reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
    /// Meters below ground level; larger means drier.
    pub depth_below_ground_m: f64,
}

/// A reading reduced to what the estimators consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthPoint {
    pub timestamp: DateTime<Utc>,
    pub depth_m: f64,
}

/// Collapses a chronologically ordered measurement slice into one point per
/// timestamp. When several readings share a timestamp the last one in the
/// slice (the latest ingested) wins.
pub fn dedup_latest(measurements: &[Measurement]) -> Vec<DepthPoint> {
    let mut points: Vec<DepthPoint> = Vec::with_capacity(measurements.len());

    for m in measurements {
        let point = DepthPoint {
            timestamp: m.timestamp,
            depth_m: m.depth_below_ground_m,
        };
        match points.last_mut() {
            Some(last) if last.timestamp == m.timestamp => *last = point,
            _ => points.push(point),
        }
    }

    points
}

// ---------------------------------------------------------------------------
// Derived metrics
// ---------------------------------------------------------------------------

/// Direction of the water table over the evaluation window.
///
/// Note the sign convention: depth below ground *increasing* means the water
/// table is dropping, which is `Falling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rising" => Some(Trend::Rising),
            "falling" => Some(Trend::Falling),
            "stable" => Some(Trend::Stable),
            _ => None,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert levels, ordered from worst to best so that `Critical < Good`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Critical,
    Warning,
    Normal,
    Good,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Critical => "critical",
            AlertStatus::Warning => "warning",
            AlertStatus::Normal => "normal",
            AlertStatus::Good => "good",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(AlertStatus::Critical),
            "warning" => Some(AlertStatus::Warning),
            "normal" => Some(AlertStatus::Normal),
            "good" => Some(AlertStatus::Good),
            _ => None,
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of the record can be taken at face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Complete,
    /// The latest depth was outside `[0, well_depth]` and was clamped.
    ClampedInput,
    /// Non-finite readings in the window were dropped before evaluation.
    DiscardedReadings,
    /// No reading in the window; storage and alert are placeholders.
    InsufficientData,
}

impl DataQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataQuality::Complete => "complete",
            DataQuality::ClampedInput => "clamped_input",
            DataQuality::DiscardedReadings => "discarded_readings",
            DataQuality::InsufficientData => "insufficient_data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(DataQuality::Complete),
            "clamped_input" => Some(DataQuality::ClampedInput),
            "discarded_readings" => Some(DataQuality::DiscardedReadings),
            "insufficient_data" => Some(DataQuality::InsufficientData),
            _ => None,
        }
    }
}

/// One evaluation of a station. Immutable once created; a newer record
/// supersedes it, the latest by `calculation_date` is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub station_id: String,
    pub calculation_date: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,

    // Recharge
    pub estimated_recharge_m3: f64,
    pub recharge_volume_available: bool,
    pub recharge_rate_mm_per_year: f64,

    // Storage
    pub current_storage_m3: Option<f64>,
    pub available_storage_capacity_m3: Option<f64>,
    pub storage_percentage: Option<f64>,
    pub current_depth_m: Option<f64>,
    pub water_level_elevation_m: Option<f64>,

    // Trend
    pub trend: Trend,
    /// Signed slope of depth below ground, m/year. Positive = falling table.
    pub trend_magnitude_m_per_year: f64,

    pub alert_status: AlertStatus,
    pub data_quality: DataQuality,
    pub measurement_count: usize,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by the evaluation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The station record cannot support storage math (e.g. `well_depth <= 0`).
    #[error("invalid geometry for station {station_id}: {reason}")]
    InvalidGeometry { station_id: String, reason: String },

    /// Neither a storage percentage nor a depth reading is available.
    #[error("insufficient data to classify station {station_id}")]
    InsufficientData { station_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
