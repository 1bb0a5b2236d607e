// handlers/elevated/admin/mod.rs - Admin handlers

use uuid::Uuid;

use crate::error::ApiError;

pub mod dashboard;   // GET /api/admin/dashboard/stats, GET /api/admin/otps
pub mod instructors; // POST /api/auth/admin/create-instructor
pub mod users;       // /api/admin/users[/:id[/status|/deactivate|/activate]]

pub use dashboard::{otps_get, stats_get};
pub use instructors::create_instructor_post;
pub use users::{
    user_activate, user_deactivate, user_delete, user_get, user_list, user_status, user_update,
};

/// Path ids are taken as strings so a malformed id gets the JSON envelope
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid ID format"))
}
