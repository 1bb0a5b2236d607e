// handlers/public/root.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routes::AppState;

pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "LMS Auth API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Learning management system backend: accounts, sessions and OTP recovery",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "auth": "/api/auth/* (signup, login, recovery public; session routes bearer)",
            "admin": "/api/admin/* (bearer, admin)",
            "enrollments": "/api/enrollments/me (bearer)",
            "payments": "/api/payments/key (bearer)",
        }
    }))
}

/// Store connectivity probe; 503 when the user store cannot be reached
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.stores.users.ping().await {
        Ok(()) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": "ok"
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            let error = ApiError::service_unavailable("Database temporarily unavailable");
            let mut body = error.to_json();
            body["data"] = json!({ "status": "degraded", "timestamp": now });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}
