/// Water table trend estimation.
///
/// Fits depth below ground against elapsed time with ordinary least squares.
/// Time is measured in years from the first reading, so the fitted slope is
/// directly in m/year.
///
/// # Sign convention
/// The series is *depth below ground*. A positive slope means the water is
/// getting deeper (the water table is dropping) and is labelled `Falling`.
/// A negative slope is `Rising`.

use crate::analysis::years_between;
use crate::config::TrendConfig;
use crate::model::{DepthPoint, Trend};

/// Direction and signed slope of the depth series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendEstimate {
    pub trend: Trend,
    /// Slope of depth below ground, m/year (signed).
    pub magnitude_m_per_year: f64,
}

impl TrendEstimate {
    pub fn stable() -> Self {
        Self {
            trend: Trend::Stable,
            magnitude_m_per_year: 0.0,
        }
    }
}

/// Estimates the trend of a chronologically ordered, de-duplicated series.
///
/// Fewer than two distinct timestamps is insufficient data, not an error:
/// the result is `Stable` with zero magnitude.
pub fn estimate_trend(points: &[DepthPoint], config: &TrendConfig) -> TrendEstimate {
    let slope = match least_squares_slope(points) {
        Some(slope) => slope,
        None => return TrendEstimate::stable(),
    };

    let trend = if slope.abs() < config.stable_epsilon_m_per_year {
        Trend::Stable
    } else if slope > 0.0 {
        Trend::Falling
    } else {
        Trend::Rising
    };

    TrendEstimate {
        trend,
        magnitude_m_per_year: slope,
    }
}

/// OLS slope of depth (m) against time (years since the first point).
///
/// Uses the centered form, which is exact for a constant series.
/// Returns `None` when the time variance is zero.
fn least_squares_slope(points: &[DepthPoint]) -> Option<f64> {
    let first = points.first()?;
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let times: Vec<f64> = points
        .iter()
        .map(|p| years_between(first.timestamp, p.timestamp))
        .collect();

    let mean_t = times.iter().sum::<f64>() / n;
    let mean_d = points.iter().map(|p| p.depth_m).sum::<f64>() / n;

    let mut s_td = 0.0;
    let mut s_tt = 0.0;
    for (t, p) in times.iter().zip(points) {
        let dt = t - mean_t;
        s_td += dt * (p.depth_m - mean_d);
        s_tt += dt * dt;
    }

    if s_tt == 0.0 {
        return None;
    }

    Some(s_td / s_tt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn series(depths: &[f64], step_days: i64) -> Vec<DepthPoint> {
        depths
            .iter()
            .enumerate()
            .map(|(i, &d)| DepthPoint {
                timestamp: start() + Duration::days(i as i64 * step_days),
                depth_m: d,
            })
            .collect()
    }

    #[test]
    fn test_increasing_depth_is_falling_water_table() {
        let estimate = estimate_trend(&series(&[8.0, 9.0, 10.5, 11.0, 13.0], 30), &TrendConfig::default());
        assert_eq!(estimate.trend, Trend::Falling);
        assert!(estimate.magnitude_m_per_year > 0.0);
    }

    #[test]
    fn test_decreasing_depth_is_rising_water_table() {
        let estimate = estimate_trend(&series(&[20.0, 18.0, 17.5, 15.0], 30), &TrendConfig::default());
        assert_eq!(estimate.trend, Trend::Rising);
        assert!(estimate.magnitude_m_per_year < 0.0);
    }

    #[test]
    fn test_monotone_series_always_match_sign_convention() {
        let config = TrendConfig::default();
        for step in [0.05, 0.5, 2.0] {
            for len in [2usize, 5, 12] {
                let up: Vec<f64> = (0..len).map(|i| 10.0 + step * i as f64).collect();
                let down: Vec<f64> = up.iter().rev().copied().collect();

                let rising_depth = estimate_trend(&series(&up, 30), &config);
                assert_eq!(rising_depth.trend, Trend::Falling, "step {} len {}", step, len);
                assert!(rising_depth.magnitude_m_per_year > 0.0);

                let falling_depth = estimate_trend(&series(&down, 30), &config);
                assert_eq!(falling_depth.trend, Trend::Rising, "step {} len {}", step, len);
                assert!(falling_depth.magnitude_m_per_year < 0.0);
            }
        }
    }

    #[test]
    fn test_slope_is_in_meters_per_year() {
        // 1 m deeper every 365.25 days → slope of exactly 1 m/year.
        let points = vec![
            DepthPoint { timestamp: start(), depth_m: 10.0 },
            DepthPoint { timestamp: start() + Duration::hours(365 * 24 + 6), depth_m: 11.0 },
        ];
        let estimate = estimate_trend(&points, &TrendConfig::default());
        assert!((estimate.magnitude_m_per_year - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_series_is_stable_with_zero_slope() {
        let estimate = estimate_trend(&series(&[5.0; 12], 30), &TrendConfig::default());
        assert_eq!(estimate.trend, Trend::Stable);
        assert_eq!(estimate.magnitude_m_per_year, 0.0);
    }

    #[test]
    fn test_small_slope_under_epsilon_is_stable_but_keeps_magnitude() {
        // 0.05 m over a year is under the 0.1 m/year default.
        let points = series(&[10.0, 10.05], 365);
        let estimate = estimate_trend(&points, &TrendConfig::default());
        assert_eq!(estimate.trend, Trend::Stable);
        assert!(estimate.magnitude_m_per_year > 0.0);
    }

    #[test]
    fn test_epsilon_is_configurable() {
        let points = series(&[10.0, 10.05], 365);
        let strict = TrendConfig { stable_epsilon_m_per_year: 0.01 };
        assert_eq!(estimate_trend(&points, &strict).trend, Trend::Falling);
    }

    #[test]
    fn test_slope_exactly_at_epsilon_is_not_stable() {
        let deepening = series(&[10.0, 10.4, 10.9], 120);
        let recovering = series(&[10.9, 10.4, 10.0], 120);

        for (points, expected) in [(deepening, Trend::Falling), (recovering, Trend::Rising)] {
            let exact = TrendConfig { stable_epsilon_m_per_year: 0.0 };
            let slope = estimate_trend(&points, &exact).magnitude_m_per_year;

            let at_boundary = TrendConfig { stable_epsilon_m_per_year: slope.abs() };
            assert_eq!(estimate_trend(&points, &at_boundary).trend, expected);

            let just_above = TrendConfig { stable_epsilon_m_per_year: slope.abs() * (1.0 + 1e-12) };
            assert_eq!(estimate_trend(&points, &just_above).trend, Trend::Stable);
        }
    }

    #[test]
    fn test_single_point_is_insufficient_data() {
        let estimate = estimate_trend(&series(&[12.0], 30), &TrendConfig::default());
        assert_eq!(estimate, TrendEstimate::stable());
    }

    #[test]
    fn test_empty_series_is_insufficient_data() {
        assert_eq!(estimate_trend(&[], &TrendConfig::default()), TrendEstimate::stable());
    }
}
