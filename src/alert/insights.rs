//! Decision-support messages derived from the alert summary.
//!
//! Produces a short, prioritised list for planners: stress first, then
//! decline, then coverage gaps, then the all-clear. There is always at least
//! one insight.

use serde::Serialize;

use crate::alert::thresholds::AlertSummary;

/// Stations needed before an absence of alerts counts as a stable picture.
pub const STABLE_PICTURE_MIN_STATIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightPriority {
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub priority: InsightPriority,
    pub title: String,
    pub message: String,
    pub action: String,
}

impl Insight {
    fn new(priority: InsightPriority, title: &str, message: String, action: &str) -> Self {
        Self {
            priority,
            title: title.to_string(),
            message,
            action: action.to_string(),
        }
    }
}

/// Builds insights from the latest-record summary and the number of active
/// stations.
pub fn insights(summary: &AlertSummary, active_stations: usize) -> Vec<Insight> {
    let mut out = Vec::new();

    if summary.critical > 0 {
        out.push(Insight::new(
            InsightPriority::High,
            "Critical groundwater stress",
            format!(
                "{} station(s) in critical status. Assess abstraction and demand in the affected areas now.",
                summary.critical
            ),
            "Prioritise recharge works and regulate extraction around critical wells.",
        ));
    }

    if summary.warning > 0 {
        out.push(Insight::new(
            InsightPriority::Medium,
            "Declining groundwater levels",
            format!(
                "{} station(s) at warning. Watch their trends through the next season.",
                summary.warning
            ),
            "Review extraction patterns and encourage rainwater harvesting near warning wells.",
        ));
    }

    let pending = active_stations.saturating_sub(summary.total);
    if pending > 0 {
        out.push(Insight::new(
            InsightPriority::Info,
            "Resource evaluation pending",
            format!(
                "{} of {} active station(s) have no computed metrics yet.",
                pending, active_stations
            ),
            "Check that water level readings are arriving for these stations.",
        ));
    }

    if summary.total >= STABLE_PICTURE_MIN_STATIONS && summary.critical + summary.warning == 0 {
        out.push(Insight::new(
            InsightPriority::Low,
            "Stable resource picture",
            format!("No critical or warning alerts across {} station(s).", summary.total),
            "Continue routine monitoring; use trends to plan long-term interventions.",
        ));
    }

    if out.is_empty() {
        out.push(Insight::new(
            InsightPriority::Info,
            "More monitoring data needed",
            "Too few evaluated stations to draw a regional picture.".to_string(),
            "Register stations and ingest water level readings.",
        ));
    }

    out.sort_by_key(|i| i.priority);
    out
}
