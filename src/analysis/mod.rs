/// Numeric estimators run over a station's evaluation window.
///
/// Submodules:
/// - `trend`    - least-squares slope of depth over time → rising/falling/stable.
/// - `recharge` - largest recharge period in the window → volume and rate.
/// - `storage`  - latest depth + well geometry → storage and fill percentage.
///
/// All three are pure functions of their inputs and run independently on
/// the same de-duplicated depth series.

pub mod recharge;
pub mod storage;
pub mod trend;

use chrono::{DateTime, Utc};

/// Seconds in a Julian year, the unit for every per-year rate here.
pub const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Elapsed time from `start` to `end`, in years.
pub fn years_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / SECONDS_PER_YEAR
}
