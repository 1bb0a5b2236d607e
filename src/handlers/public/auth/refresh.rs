// handlers/public/auth/refresh.rs - POST /api/auth/refresh-token handler

use axum::{body::Bytes, extract::State};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::middleware::cookies::{self, WithCookies, REFRESH_COOKIE};
use crate::middleware::ApiResponse;
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// The refresh token from the cookie, else from an optional JSON body
pub(crate) fn presented_refresh_token(jar: &CookieJar, body: &[u8]) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            serde_json::from_slice::<RefreshRequest>(body)
                .ok()
                .and_then(|r| r.refresh_token)
        })
}

/**
 * POST /api/auth/refresh-token - Rotate the session's token pair
 *
 * The refresh token is read from the refreshToken cookie or `{"refreshToken": "..."}`.
 * Each refresh token works once. Both cookies are replaced; the body carries
 * only the new access token.
 */
pub async fn refresh_post(State(state): State<AppState>, jar: CookieJar, body: Bytes) -> WithCookies<RefreshResponse> {
    let presented = presented_refresh_token(&jar, &body);
    let tokens = state.auth.refresh(presented.as_deref()).await?;
    let jar = cookies::set_session(jar, &state.config.cookies, &tokens);
    Ok((
        jar,
        ApiResponse::success(RefreshResponse {
            access_token: tokens.access_token,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn cookie_is_preferred_over_body() {
        let jar = CookieJar::new().add(Cookie::new(REFRESH_COOKIE, "from-cookie"));
        let body = br#"{"refreshToken":"from-body"}"#;
        assert_eq!(presented_refresh_token(&jar, body).as_deref(), Some("from-cookie"));
        assert_eq!(presented_refresh_token(&CookieJar::new(), body).as_deref(), Some("from-body"));
        assert_eq!(presented_refresh_token(&CookieJar::new(), b""), None);
    }
}
