// handlers/elevated/admin/users.rs - User management handlers

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::Value;

use super::parse_id;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::routes::AppState;
use crate::services::admin_service::{UserEdit, UserList, UserQuery};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusRequest {
    pub status: String,
}

/// GET /api/admin/users?role=&status=&search=
pub async fn user_list(State(state): State<AppState>, Query(query): Query<UserQuery>) -> ApiResult<UserList> {
    Ok(ApiResponse::success(state.admin.list_users(query).await?))
}

/// GET /api/admin/users/:id
pub async fn user_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(state.admin.get_user(id).await?))
}

/// DELETE /api/admin/users/:id - admin accounts are refused
pub async fn user_delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    state.admin.delete_user(id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}

/// PATCH /api/admin/users/:id/status
pub async fn user_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<StatusRequest>,
) -> ApiResult<User> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(state.admin.set_status(id, &body.status).await?))
}

/// PATCH /api/admin/users/:id/deactivate
pub async fn user_deactivate(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(state.admin.deactivate(id).await?))
}

/// PATCH /api/admin/users/:id/activate
pub async fn user_activate(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(state.admin.activate(id).await?))
}

/// PATCH /api/admin/users/:id - firstName, lastName, email and role only
pub async fn user_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UserEdit>,
) -> ApiResult<User> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(state.admin.update_user(id, body).await?))
}
