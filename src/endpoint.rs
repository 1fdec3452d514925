/// HTTP endpoint for querying groundwater resource metrics
///
/// Serves JSON to dashboards and analysis tools. Station metrics go through
/// `MetricsService::metrics_for`, so a request for a stale station
/// recomputes before answering.
///
/// Endpoints:
/// - GET /health - Service health check
/// - GET /station/{station_id}/metrics - Authoritative metrics for a station
/// - GET /station/{station_id}/history[?alert_status=...] - Stored records, newest first
/// - GET /alerts - Alert counts plus the stations needing attention
/// - GET /insights - Prioritised decision-support messages

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::insights::Insight;
use crate::model::{AlertStatus, EngineError, ResourceMetrics};
use crate::monitor::{MetricsOutcome, MetricsService};
use crate::store::{ResourceStore, StoreError};

type JsonResponse = tiny_http::Response<std::io::Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    StationMetrics(String),
    StationHistory {
        station_id: String,
        alert_status: Option<String>,
    },
    Alerts,
    Insights,
    MethodNotAllowed,
    NotFound,
}

/// Maps a request line onto a route. Only the history route reads the
/// query string.
pub fn route(method: &tiny_http::Method, url: &str) -> Route {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = path.trim_end_matches('/');

    let matched = match path {
        "/health" => Route::Health,
        "/alerts" => Route::Alerts,
        "/insights" => Route::Insights,
        _ => match path.strip_prefix("/station/").and_then(|rest| rest.split_once('/')) {
            Some((id, _)) if id.is_empty() => Route::NotFound,
            Some((id, "metrics")) => Route::StationMetrics(id.to_string()),
            Some((id, "history")) => Route::StationHistory {
                station_id: id.to_string(),
                alert_status: query_param(query, "alert_status").map(str::to_string),
            },
            _ => Route::NotFound,
        },
    };

    if matched != Route::NotFound && *method != tiny_http::Method::Get {
        return Route::MethodNotAllowed;
    }
    matched
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, v)| *k == key && !v.is_empty())
        .map(|(_, v)| v)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Station metrics plus how they were obtained.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub metrics: ResourceMetrics,
    /// Freshness before this request (`absent`, `fresh`, `stale (...)`).
    pub prior_state: String,
    pub recomputed: bool,
}

impl From<MetricsOutcome> for MetricsResponse {
    fn from(outcome: MetricsOutcome) -> Self {
        Self {
            prior_state: outcome.prior_state.to_string(),
            recomputed: outcome.recomputed,
            metrics: outcome.metrics,
        }
    }
}

/// A station's stored records, newest first.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub station_id: String,
    pub count: usize,
    pub records: Vec<ResourceMetrics>,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    pub insights: Vec<Insight>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Resolves a route to a status code and JSON body.
pub fn handle<S: ResourceStore>(
    service: &mut MetricsService<S>,
    route: &Route,
    now: DateTime<Utc>,
) -> (u16, serde_json::Value) {
    match route {
        Route::Health => (
            200,
            serde_json::json!({
                "status": "ok",
                "service": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }),
        ),
        Route::StationMetrics(station_id) => handle_station_metrics(service, station_id, now),
        Route::StationHistory { station_id, alert_status } => {
            handle_station_history(service, station_id, alert_status.as_deref())
        }
        Route::Alerts => handle_alerts(service),
        Route::Insights => handle_insights(service),
        Route::MethodNotAllowed => (405, serde_json::json!({ "error": "Method not allowed" })),
        Route::NotFound => (
            404,
            serde_json::json!({
                "error": "Not found",
                "available_endpoints": [
                    "/health",
                    "/station/{station_id}/metrics",
                    "/station/{station_id}/history",
                    "/alerts",
                    "/insights"
                ]
            }),
        ),
    }
}

fn handle_station_metrics<S: ResourceStore>(
    service: &mut MetricsService<S>,
    station_id: &str,
    now: DateTime<Utc>,
) -> (u16, serde_json::Value) {
    match service.metrics_for(station_id, now) {
        Ok(outcome) => to_json(200, &MetricsResponse::from(outcome)),
        Err(e) => station_error(station_id, &e),
    }
}

fn handle_station_history<S: ResourceStore>(
    service: &mut MetricsService<S>,
    station_id: &str,
    alert_status: Option<&str>,
) -> (u16, serde_json::Value) {
    let filter = match alert_status {
        None => None,
        Some(raw) => match AlertStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return (
                    400,
                    serde_json::json!({
                        "error": format!("unknown alert_status '{}'", raw),
                        "allowed": ["critical", "warning", "normal", "good"]
                    }),
                );
            }
        },
    };

    match service.history(station_id, filter) {
        Ok(records) => to_json(
            200,
            &HistoryResponse {
                station_id: station_id.to_string(),
                count: records.len(),
                records,
            },
        ),
        Err(e) => station_error(station_id, &e),
    }
}

fn station_error(station_id: &str, e: &EngineError) -> (u16, serde_json::Value) {
    let status = error_status(e);
    if status >= 500 {
        tracing::error!(station_id, error = %e, "station request failed");
    } else {
        tracing::warn!(station_id, error = %e, "station request rejected");
    }
    (
        status,
        serde_json::json!({
            "error": e.to_string(),
            "station_id": station_id
        }),
    )
}

fn handle_alerts<S: ResourceStore>(service: &mut MetricsService<S>) -> (u16, serde_json::Value) {
    match service.alert_summary() {
        Ok(summary) => to_json(200, &summary),
        Err(e) => {
            tracing::error!(error = %e, "alert summary failed");
            (500, serde_json::json!({ "error": e.to_string() }))
        }
    }
}

fn handle_insights<S: ResourceStore>(service: &mut MetricsService<S>) -> (u16, serde_json::Value) {
    match service.insights() {
        Ok(insights) => to_json(200, &InsightsResponse { insights }),
        Err(e) => {
            tracing::error!(error = %e, "insights failed");
            (500, serde_json::json!({ "error": e.to_string() }))
        }
    }
}

/// HTTP status for an engine error.
pub fn error_status(err: &EngineError) -> u16 {
    match err {
        EngineError::Store(StoreError::StationNotFound(_)) => 404,
        EngineError::InvalidGeometry { .. } | EngineError::InsufficientData { .. } => 422,
        EngineError::Store(_) => 500,
    }
}

fn to_json<T: Serialize>(status: u16, body: &T) -> (u16, serde_json::Value) {
    match serde_json::to_value(body) {
        Ok(value) => (status, value),
        Err(e) => (500, serde_json::json!({ "error": format!("serialization failed: {}", e) })),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start HTTP endpoint server on the specified port. Blocks for the life of
/// the server.
pub fn start_endpoint_server<S: ResourceStore>(port: u16, mut service: MetricsService<S>) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    tracing::info!(port, "HTTP endpoint listening");

    for request in server.incoming_requests() {
        let route = route(request.method(), request.url());
        tracing::debug!(url = request.url(), ?route, "request");

        let (status, body) = handle(&mut service, &route, Utc::now());

        if let Err(e) = request.respond(create_response(status, &body)) {
            tracing::warn!(error = %e, "failed to send response");
        }
    }

    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &serde_json::Value) -> JsonResponse {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());
    let mut response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    if let Ok(header) = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response.add_header(header);
    }
    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
