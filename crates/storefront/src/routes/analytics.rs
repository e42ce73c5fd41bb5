//! Admin analytics route.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::services::analytics::{AnalyticsService, AnalyticsSummary, DailySales, dashboard_window};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub analytics_data: AnalyticsSummary,
    pub daily_sales_data: Vec<DailySales>,
}

/// Store totals and sales for the last seven days.
///
/// GET /api/analytics (admin)
///
/// # Errors
///
/// Returns 401/403 for non-admins.
#[tracing::instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<DashboardResponse>, AppError> {
    let analytics = AnalyticsService::new(state.pool());
    let (start, end) = dashboard_window(Utc::now());

    let (analytics_data, daily_sales_data) =
        tokio::try_join!(analytics.summary(), analytics.daily_sales(start, end))?;

    Ok(Json(DashboardResponse {
        analytics_data,
        daily_sales_data,
    }))
}
