// handlers/elevated/admin/dashboard.rs - Admin overview handlers

use axum::extract::{Query, State};
use serde::Deserialize;

use crate::database::models::MaskedOtp;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::services::admin_service::DashboardStats;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OtpQuery {
    pub email: Option<String>,
}

/// GET /api/admin/dashboard/stats
pub async fn stats_get(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    Ok(ApiResponse::success(state.admin.dashboard_stats().await?))
}

/// GET /api/admin/otps?email= - newest records, codes masked
pub async fn otps_get(State(state): State<AppState>, Query(query): Query<OtpQuery>) -> ApiResult<Vec<MaskedOtp>> {
    Ok(ApiResponse::success(state.admin.recent_otps(query.email.as_deref()).await?))
}
