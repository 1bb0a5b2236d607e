// handlers/protected/payments.rs - GET /api/payments/key
//
// Hands the public checkout key to signed-in clients. Nothing else about the
// payment gateway is handled here.

use axum::extract::State;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

pub async fn key_get(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({ "key": state.config.payments.razorpay_key_id })))
}
