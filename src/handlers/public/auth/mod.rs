// handlers/public/auth/mod.rs - Token acquisition endpoints

pub mod login;    // POST /login - authenticate and get a token pair
pub mod refresh;  // POST /refresh-token - new access token from a refresh token
pub mod register; // POST /register - create new account

pub use login::login_post;
pub use refresh::refresh_post;
pub use register::register_post;
