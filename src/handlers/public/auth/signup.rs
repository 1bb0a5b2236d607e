// handlers/public/auth/signup.rs - POST /api/auth/signup handler

use axum::extract::State;
use axum_extra::extract::CookieJar;

use crate::middleware::cookies::{self, WithCookies};
use crate::middleware::{ApiResponse, JsonBody};
use crate::routes::AppState;
use crate::services::auth_service::{AuthSession, SignupInput};

/**
 * POST /api/auth/signup - Self-service student registration
 *
 * Expected Input:
 * ```json
 * {
 *   "firstName": "Alice", "lastName": "Smith", "email": "alice@x.com",
 *   "mobileNo": "9876543210", "gender": "female",
 *   "password": "Secret1", "confirmPassword": "Secret1"
 * }
 * ```
 *
 * Responds 201 with `{accessToken, refreshToken, user}` and sets both session
 * cookies. A welcome email is queued; its delivery never affects the response.
 */
pub async fn signup_post(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(input): JsonBody<SignupInput>,
) -> WithCookies<AuthSession> {
    let session = state.auth.signup_student(input).await?;
    let jar = cookies::set_session(jar, &state.config.cookies, &session.tokens);
    Ok((jar, ApiResponse::created(session)))
}
