// handlers/public/auth/mod.rs - Public authentication handlers
//
// Session acquisition: signup, password/OTP login, recovery, refresh.
// Every handler that yields a session also sets the accessToken and
// refreshToken cookies.

pub mod login;    // POST /api/auth/login, /api/auth/admin/login
pub mod recovery; // POST /api/auth/forgot-password, /api/auth/verify-otp-login
pub mod refresh;  // POST /api/auth/refresh-token
pub mod signup;   // POST /api/auth/signup, /api/auth/signup/student

pub use login::login_post;
pub use recovery::{forgot_password_post, verify_otp_login_post};
pub use refresh::refresh_post;
pub use signup::signup_post;
