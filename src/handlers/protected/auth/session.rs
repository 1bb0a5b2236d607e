// handlers/protected/auth/session.rs - Session and profile handlers

use axum::{body::Bytes, extract::State, Extension};
use axum_extra::extract::CookieJar;
use serde_json::Value;

use crate::database::models::User;
use crate::handlers::public::auth::refresh::presented_refresh_token;
use crate::middleware::cookies::{self, WithCookies};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::routes::AppState;
use crate::services::auth_service::ProfileInput;

/**
 * POST /api/auth/logout - Revoke the session and clear both cookies
 *
 * Revocation is best effort: a missing or already revoked refresh token still
 * logs out. The clearing cookies carry the same attributes as the ones set at
 * login, otherwise browsers keep the originals.
 */
pub async fn logout_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
    body: Bytes,
) -> WithCookies<Value> {
    let presented = presented_refresh_token(&jar, &body);
    state.auth.logout(presented.as_deref()).await?;
    tracing::info!(user_id = %user.id, "User logged out");

    let jar = cookies::clear_session(jar, &state.config.cookies);
    Ok((jar, ApiResponse::message("Logged out successfully")))
}

/// GET /api/auth/me
pub async fn me_get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<User> {
    Ok(ApiResponse::success(state.auth.current_user(user.id).await?))
}

/// PUT /api/auth/complete-profile - replaces address, education and bio
pub async fn complete_profile_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody<ProfileInput>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(state.auth.complete_profile(user.id, body).await?))
}
