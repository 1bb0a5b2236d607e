// handlers/elevated/mod.rs - Elevated handlers (admin capability required)
//
// Security Level: bearer token + role allowing `Capability::ManageUsers`
// Middleware: require_auth, then require_admin
//
// Instructor provisioning lives here too even though it is mounted under
// /api/auth/admin; it goes through the same gate.

pub mod admin;
