// middleware/cookies.rs - Session cookie plumbing
//
// Both session cookies are written and cleared through the same builder so the
// clearing cookie always carries the attributes the browser stored.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::{CookieConfig, SameSitePolicy};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::TokenPair;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Handler result that also updates the cookie jar
pub type WithCookies<T> = Result<(CookieJar, ApiResponse<T>), ApiError>;

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

fn session_cookie(name: &'static str, value: String, max_age_ms: i64, config: &CookieConfig) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(config.http_only)
        .secure(config.secure)
        .same_site(same_site(config.same_site))
        .path(config.path.clone())
        .max_age(time::Duration::milliseconds(max_age_ms))
        .build()
}

/// Set both session cookies for a freshly issued or rotated pair
pub fn set_session(jar: CookieJar, config: &CookieConfig, tokens: &TokenPair) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_COOKIE,
        tokens.access_token.clone(),
        config.access_max_age_ms,
        config,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        config.refresh_max_age_ms,
        config,
    ))
}

/// Expire both session cookies
pub fn clear_session(jar: CookieJar, config: &CookieConfig) -> CookieJar {
    let mut access = session_cookie(ACCESS_COOKIE, String::new(), config.access_max_age_ms, config);
    access.make_removal();
    let mut refresh = session_cookie(REFRESH_COOKIE, String::new(), config.refresh_max_age_ms, config);
    refresh.make_removal();
    jar.add(access).add(refresh)
}
