// handlers/protected/auth/mod.rs - Authenticated account handlers

pub mod password; // POST /api/auth/{set-password,reset-password,reset-password-forgot}
pub mod session;  // POST /api/auth/logout, GET /api/auth/me, PUT /api/auth/complete-profile

pub use password::{reset_password_forgot_post, reset_password_post, set_password_post};
pub use session::{complete_profile_put, logout_post, me_get};
