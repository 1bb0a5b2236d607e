// handlers/public/auth/recovery.rs - OTP recovery handlers

use axum::extract::State;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::Value;

use crate::middleware::cookies::{self, WithCookies};
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::routes::AppState;
use crate::services::auth_service::AuthSession;

const OTP_SENT: &str = "If your email is registered with us, you will receive an OTP shortly";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// POST /api/auth/forgot-password - same answer whether or not the email is registered
pub async fn forgot_password_post(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ForgotPasswordRequest>,
) -> ApiResult<Value> {
    state.auth.forgot_password(&body.email).await?;
    Ok(ApiResponse::message(OTP_SENT))
}

/// POST /api/auth/verify-otp-login - recovery login, flagged `requiresPasswordReset`
pub async fn verify_otp_login_post(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(body): JsonBody<VerifyOtpRequest>,
) -> WithCookies<AuthSession> {
    let session = state.auth.verify_otp_login(&body.email, &body.otp).await?;
    let jar = cookies::set_session(jar, &state.config.cookies, &session.tokens);
    Ok((jar, ApiResponse::success(session)))
}
