// handlers/protected/enrollments.rs - GET /api/enrollments/me

use axum::{extract::State, Extension};

use crate::database::models::Enrollment;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::routes::AppState;

pub async fn my_enrollments_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<Enrollment>> {
    let enrollments = state.stores.enrollments.list_for_user(user.id).await?;
    Ok(ApiResponse::success(enrollments))
}
