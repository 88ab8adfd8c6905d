//! Dashboard overview: headline counters plus the raw chart payload.

use pomgmt_core::endpoints;
use serde::{Deserialize, Serialize};

use crate::http::{ApiClient, ApiError};

/// Headline counters. Any counter the server omits reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicStats {
    pub total_merged_records: u64,
    pub total_value: f64,
    pub total_pos: u64,
    pub total_acceptances: u64,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsPayload {
    #[serde(default)]
    basic_stats: Option<BasicStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardOverview {
    pub basic_stats: BasicStats,
    /// `/api/charts-data` as returned; its shape is owned by the server.
    pub charts: serde_json::Value,
}

impl ApiClient {
    /// Fetch analytics and chart data concurrently. Fails if either fails.
    pub async fn dashboard_overview(&self) -> Result<DashboardOverview, ApiError> {
        let (analytics, charts) = futures::try_join!(
            self.get_json::<AnalyticsPayload>(endpoints::DASHBOARD_ANALYTICS, Vec::new()),
            self.get_json::<serde_json::Value>(endpoints::CHARTS_DATA, Vec::new()),
        )
        .inspect_err(|e| tracing::warn!(error = %e, "Failed to load dashboard data"))?;

        Ok(DashboardOverview {
            basic_stats: analytics.basic_stats.unwrap_or_default(),
            charts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_counters_default_to_zero() {
        let payload: AnalyticsPayload =
            serde_json::from_value(serde_json::json!({ "basic_stats": { "total_pos": 7 } }))
                .unwrap();
        let stats = payload.basic_stats.unwrap();
        assert_eq!(stats.total_pos, 7);
        assert_eq!(stats.total_merged_records, 0);
        assert_eq!(stats.total_value, 0.0);
    }

    #[test]
    fn missing_basic_stats_is_all_zero() {
        let payload: AnalyticsPayload =
            serde_json::from_value(serde_json::json!({ "status_breakdown": [] })).unwrap();
        assert_eq!(payload.basic_stats.unwrap_or_default(), BasicStats::default());
    }
}
