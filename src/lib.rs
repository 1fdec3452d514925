/// gwres_service: groundwater resource evaluation for monitoring wells.
///
/// # Module structure
///
/// ```text
/// gwres_service
/// ├── model       — shared data types (StationGeometry, Measurement, ResourceMetrics, EngineError, …)
/// ├── config      — engine + daemon configuration loader (gwres.toml)
/// ├── engine      — evaluate(): one station snapshot → one ResourceMetrics record
/// ├── analysis
/// │   ├── trend    — least-squares depth trend (rising / falling / stable)
/// │   ├── recharge — recharge period detection and volume/rate estimate
/// │   └── storage  — saturated thickness, storage volume, percentage full
/// ├── alert
/// │   ├── thresholds — storage percentage + trend → alert status, summaries
/// │   ├── insights   — prioritised decision-support messages from a summary
/// │   └── staleness  — absent / fresh / stale metrics state machine
/// ├── store       — ResourceStore trait + in-memory implementation
/// ├── db          — PostgreSQL connection validation and PgStore
/// ├── monitor     — get-or-recompute metrics service, history, insights
/// ├── daemon      — periodic parallel refresh of every station
/// └── endpoint    — HTTP API for metrics, history, alerts and insights
/// ```

/// Public modules
pub mod alert;
pub mod analysis;
pub mod config;
pub mod daemon;
pub mod db;
pub mod endpoint;
pub mod engine;
pub mod model;
pub mod monitor;
pub mod store;
