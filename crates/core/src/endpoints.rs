//! Remote API paths consumed by the client.
//!
//! Kept in `core` so the client adapter, the CLI and the test mock
//! server all agree on the exact same routes.

/// Form-encoded credential exchange.
pub const LOGIN: &str = "/login";

/// Paginated, filterable merged PO/acceptance rows.
pub const MERGED_DATA: &str = "/api/merged-data";

/// Spreadsheet export of the merged rows (filters only, no pagination).
pub const MERGED_DATA_EXPORT: &str = "/api/merged-data/export";

/// Purchase-order file ingestion.
pub const UPLOAD_PURCHASE_ORDER: &str = "/api/upload";

/// Acceptance file ingestion.
pub const UPLOAD_ACCEPTANCE: &str = "/api/upload-acceptance";

/// Aggregate statistics for the dashboard header.
pub const DASHBOARD_ANALYTICS: &str = "/api/dashboard-analytics";

/// Chart series for the dashboard.
pub const CHARTS_DATA: &str = "/api/charts-data";
