// middleware/auth.rs - Bearer credential gate and role gates
//
// `require_auth` resolves the access token (Authorization header first, then
// the accessToken cookie) through the token ledger and injects `AuthUser`.
// Role gates run after it and consult the capability table.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use super::cookies::ACCESS_COOKIE;
use crate::auth::Capability;
use crate::database::models::{Role, User};
use crate::error::ApiError;
use crate::routes::AppState;
use crate::services::TokenError;

const NOT_AUTHORIZED: &str = "Not authorized to access this route";

/// Authenticated principal, loaded fresh from the user store on every request
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl AuthUser {
    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = %self.role, ?capability, "Capability denied");
            Err(ApiError::forbidden(capability.denial_message()))
        }
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_access_token(request.headers(), &jar).ok_or_else(|| ApiError::unauthorized(NOT_AUTHORIZED))?;

    let user = state
        .auth
        .tokens()
        .validate_access(&token)
        .await
        .map_err(|e| match e {
            // An unparseable or forged token gets the generic message
            TokenError::Invalid | TokenError::NotFound => ApiError::unauthorized(NOT_AUTHORIZED),
            other => other.into(),
        })?;

    request.extensions_mut().insert(AuthUser::from(&user));
    Ok(next.run(request).await)
}

/// Gate for the `/api/admin` tree
pub async fn require_admin(
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    user.require(Capability::ManageUsers)?;
    Ok(next.run(request).await)
}

fn extract_access_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => jar
            .get(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        let jar = CookieJar::new().add(Cookie::new(ACCESS_COOKIE, "from-cookie"));
        assert_eq!(extract_access_token(&headers, &jar).as_deref(), Some("from-header"));
    }

    #[test]
    fn falls_back_to_cookie() {
        let jar = CookieJar::new().add(Cookie::new(ACCESS_COOKIE, "from-cookie"));
        assert_eq!(extract_access_token(&HeaderMap::new(), &jar).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn rejects_non_bearer_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_access_token(&headers, &CookieJar::new()).is_none());
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_access_token(&headers, &CookieJar::new()).is_none());
    }

    #[test]
    fn capability_denials_are_forbidden() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "alice@x.com".to_string(),
            role: Role::Student,
        };
        let err = user.require(Capability::ManageUsers).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.message(), "Admin access required");
    }
}
