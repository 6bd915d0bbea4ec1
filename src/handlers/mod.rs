// handlers/mod.rs - Two handler tiers
//
// Public (no auth) → Protected (bearer token)

pub mod protected;
pub mod public;
