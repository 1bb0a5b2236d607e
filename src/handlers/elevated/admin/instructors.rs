// handlers/elevated/admin/instructors.rs - POST /api/auth/admin/create-instructor

use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateInstructorRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CreateInstructorResponse {
    pub message: &'static str,
    pub user: User,
}

/**
 * POST /api/auth/admin/create-instructor - Provision an instructor account
 *
 * A temporary password is generated and emailed to the instructor. It is never
 * part of the response; the account is approved but must change the password
 * on first login.
 */
pub async fn create_instructor_post(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    JsonBody(body): JsonBody<CreateInstructorRequest>,
) -> ApiResult<CreateInstructorResponse> {
    let user = state
        .auth
        .create_instructor(admin.role, &body.first_name, &body.last_name, &body.email)
        .await?;
    tracing::info!(admin_id = %admin.id, instructor_id = %user.id, "Instructor provisioned");

    Ok(ApiResponse::created(CreateInstructorResponse {
        message: "Instructor created successfully. Password email sent to instructor.",
        user,
    }))
}
