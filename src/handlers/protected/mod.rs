// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// Every route here sits behind `middleware::require_bearer`, so handlers can
// take `Extension<AuthUser>` without checking for it.

pub mod notes;
