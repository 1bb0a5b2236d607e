pub mod auth;
pub mod cookies;
pub mod json;
pub mod response;

pub use auth::{require_admin, require_auth, AuthUser};
pub use json::JsonBody;
pub use response::{ApiResponse, ApiResult};
