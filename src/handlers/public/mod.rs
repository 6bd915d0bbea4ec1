// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition and the public note feed. No middleware beyond the
// global CORS and trace layers.

pub mod auth;
pub mod notes;

pub use auth::*;
pub use notes::public_get as notes_public_get;
