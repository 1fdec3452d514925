/// Storage calculation from the latest depth reading and well geometry.
///
/// The saturated thickness available in the well is
/// `well_depth − current_depth`, clamped to `[0, well_depth]`. Readings above
/// ground (negative depth) or below the well bottom are clamped rather than
/// rejected, and the result is flagged so the caller can mark the record.
///
/// The fill percentage needs only the well depth and is always computable.
/// Absolute volumes additionally need the representative area.

use crate::model::{EngineError, StationGeometry};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageEstimate {
    /// `None` in percentage-only mode (no representative area).
    pub current_storage_m3: Option<f64>,
    /// `None` in percentage-only mode.
    pub available_capacity_m3: Option<f64>,
    /// Always within `[0, 100]`.
    pub storage_percentage: f64,
    /// True when the input depth was outside `[0, well_depth]`.
    pub clamped: bool,
}

/// Rejects station records that would turn storage math into division
/// artifacts.
pub fn validate_geometry(station: &StationGeometry) -> Result<(), EngineError> {
    let invalid = |reason: String| EngineError::InvalidGeometry {
        station_id: station.station_id.clone(),
        reason,
    };

    if !station.well_depth_m.is_finite() || station.well_depth_m <= 0.0 {
        return Err(invalid(format!("well depth must be positive, got {}", station.well_depth_m)));
    }
    if !station.specific_yield.is_finite() || !(0.0..=1.0).contains(&station.specific_yield) {
        return Err(invalid(format!(
            "specific yield must be within [0, 1], got {}",
            station.specific_yield
        )));
    }
    if let Some(area) = station.representative_area_m2 {
        if !area.is_finite() || area < 0.0 {
            return Err(invalid(format!("representative area must be non-negative, got {}", area)));
        }
    }

    Ok(())
}

/// Computes storage for `current_depth_m` (meters below ground).
pub fn calculate_storage(
    station: &StationGeometry,
    current_depth_m: f64,
) -> Result<StorageEstimate, EngineError> {
    validate_geometry(station)?;

    let well_depth = station.well_depth_m;
    let clamped = !(0.0..=well_depth).contains(&current_depth_m);
    let thickness = (well_depth - current_depth_m).clamp(0.0, well_depth);

    let (current_storage_m3, available_capacity_m3) = match station.representative_area_m2 {
        Some(area) => (
            Some(thickness * station.specific_yield * area),
            Some(well_depth * station.specific_yield * area),
        ),
        None => (None, None),
    };

    Ok(StorageEstimate {
        current_storage_m3,
        available_capacity_m3,
        storage_percentage: thickness / well_depth * 100.0,
        clamped,
    })
}
