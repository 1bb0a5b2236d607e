// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Middleware: none beyond the global layers
//
// Everything here takes untrusted input with no user context, so the services
// validate every field before touching a store.

pub mod auth;
pub mod root;
