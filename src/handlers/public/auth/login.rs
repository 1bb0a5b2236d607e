// handlers/public/auth/login.rs - POST /api/auth/login handler
//
// Also mounted at /api/auth/admin/login; admins log in through the same path.

use axum::extract::State;
use axum_extra::extract::CookieJar;

use crate::middleware::cookies::{self, WithCookies};
use crate::middleware::{ApiResponse, JsonBody};
use crate::routes::AppState;
use crate::services::auth_service::{AuthSession, LoginInput};

/**
 * POST /api/auth/login - Password or OTP login
 *
 * Expected Input: `{"email": "...", "password": "..."}` or `{"email": "...", "otp": "123456"}`
 *
 * Output adds `requiresPasswordChange` and `isFirstLogin`. Both are true only
 * for an instructor's first password login with the temporary password, in
 * which case the client must call /set-password before anything else.
 */
pub async fn login_post(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(input): JsonBody<LoginInput>,
) -> WithCookies<AuthSession> {
    let session = state.auth.login(input).await?;
    let jar = cookies::set_session(jar, &state.config.cookies, &session.tokens);
    Ok((jar, ApiResponse::success(session)))
}
