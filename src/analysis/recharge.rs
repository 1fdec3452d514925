/// Recharge period detection and recharge estimation.
///
/// A recharge period is a contiguous run of readings over which depth never
/// increases (the water table is rising or holding). Of all runs spanning at
/// least two readings, the one with the largest total depth reduction is
/// used; ties go to the earliest run. A run with zero reduction (flat water
/// table) is not recharge.
///
/// Volume = Δdepth × specific yield × representative area, which needs the
/// area. Without it only the rate is reported and the volume is zero with
/// `volume_available == false`.

use chrono::{DateTime, Utc};

use crate::analysis::years_between;
use crate::model::{DepthPoint, StationGeometry};

/// Mm per meter, for the rate conversion.
const MM_PER_M: f64 = 1000.0;

/// The sub-interval of the window identified as recharge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RechargePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub start_index: usize,
    pub end_index: usize,
    /// Total fall in depth over the period, m (positive).
    pub depth_reduction_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RechargeEstimate {
    pub period: Option<RechargePeriod>,
    pub estimated_recharge_m3: f64,
    pub volume_available: bool,
    pub recharge_rate_mm_per_year: f64,
}

impl RechargeEstimate {
    fn none(volume_available: bool) -> Self {
        Self {
            period: None,
            estimated_recharge_m3: 0.0,
            volume_available,
            recharge_rate_mm_per_year: 0.0,
        }
    }
}

/// Finds the dominant recharge period in a chronologically ordered,
/// de-duplicated series.
pub fn detect_recharge_period(points: &[DepthPoint]) -> Option<RechargePeriod> {
    let mut best: Option<RechargePeriod> = None;
    let mut run_start = 0;

    for i in 1..=points.len() {
        let run_continues = i < points.len() && points[i].depth_m <= points[i - 1].depth_m;
        if run_continues {
            continue;
        }

        // Run is points[run_start..i]; needs at least two readings.
        let run_end = i - 1;
        if run_end > run_start {
            let reduction = points[run_start].depth_m - points[run_end].depth_m;
            let better = match &best {
                Some(b) => reduction > b.depth_reduction_m,
                None => reduction > 0.0,
            };
            if better {
                best = Some(RechargePeriod {
                    start: points[run_start].timestamp,
                    end: points[run_end].timestamp,
                    start_index: run_start,
                    end_index: run_end,
                    depth_reduction_m: reduction,
                });
            }
        }
        run_start = i;
    }

    best
}

/// Estimates recharge volume (m³) and rate (mm/year) for the window.
pub fn estimate_recharge(points: &[DepthPoint], station: &StationGeometry) -> RechargeEstimate {
    let volume_available = station.representative_area_m2.is_some();

    let period = match detect_recharge_period(points) {
        Some(period) => period,
        None => return RechargeEstimate::none(volume_available),
    };

    let years = years_between(period.start, period.end);
    let rate = if years > 0.0 {
        period.depth_reduction_m * MM_PER_M / years
    } else {
        0.0
    };

    let volume = station
        .representative_area_m2
        .map(|area| period.depth_reduction_m * station.specific_yield * area)
        .unwrap_or(0.0);

    RechargeEstimate {
        period: Some(period),
        estimated_recharge_m3: volume,
        volume_available,
        recharge_rate_mm_per_year: rate,
    }
}
