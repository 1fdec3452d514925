//! Alerting for groundwater resource metrics.
//!
//! - `thresholds` - storage-band alert classification and station summaries.
//! - `staleness`  - whether a station's latest metrics record is still fresh.
//! - `insights`   - prioritised decision-support messages from a summary.

pub mod insights;
pub mod staleness;
pub mod thresholds;
