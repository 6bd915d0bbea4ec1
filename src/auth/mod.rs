pub mod password;
pub mod token;

pub use password::{PasswordError, PasswordHasher, MAX_PASSWORD_BYTES};
pub use token::{AccessClaims, RefreshClaims, TokenError, TokenService};
