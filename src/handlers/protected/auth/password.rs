// handlers/protected/auth/password.rs - Password change handlers

use axum::{extract::State, Extension};
use serde::Deserialize;
use serde_json::Value;

use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewPasswordRequest {
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// POST /api/auth/set-password - instructor first-login completion
pub async fn set_password_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<NewPasswordRequest>,
) -> ApiResult<Value> {
    state
        .auth
        .set_instructor_password(user.id, user.role, &body.new_password, &body.confirm_password)
        .await?;
    Ok(ApiResponse::message("Password set successfully"))
}

/// POST /api/auth/reset-password - requires the current password
pub async fn reset_password_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<ResetPasswordRequest>,
) -> ApiResult<Value> {
    state
        .auth
        .reset_password(
            user.id,
            &body.current_password,
            &body.new_password,
            &body.confirm_password,
        )
        .await?;
    Ok(ApiResponse::message("Password reset successfully"))
}

/// POST /api/auth/reset-password-forgot - after an OTP recovery login
pub async fn reset_password_forgot_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<NewPasswordRequest>,
) -> ApiResult<Value> {
    state
        .auth
        .reset_password_after_otp(user.id, &body.new_password, &body.confirm_password)
        .await?;
    Ok(ApiResponse::message("Password reset successfully"))
}
