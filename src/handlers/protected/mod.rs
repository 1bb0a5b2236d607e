// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// Security Level: valid access token with a live ledger record and an active owner
// Middleware: require_auth, which injects `Extension<AuthUser>`

pub mod auth;
pub mod enrollments;
pub mod payments;
