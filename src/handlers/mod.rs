// handlers/mod.rs - 3-tier handler architecture
//
// Public (no credential) → Protected (bearer token) → Elevated (bearer token + admin capability)
pub mod public;    // Tier 1: /, /health, /api/auth/{signup,login,...}
pub mod protected; // Tier 2: /api/auth/{me,logout,...}, /api/enrollments, /api/payments
pub mod elevated;  // Tier 3: /api/admin/*, /api/auth/admin/create-instructor
