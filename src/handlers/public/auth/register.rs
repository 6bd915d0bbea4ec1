// handlers/public/auth/register.rs - POST /register

use axum::{extract::rejection::JsonRejection, extract::State, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiResult;
use crate::services::Registration;

/// POST /register - Create an account and return its first token pair
///
/// Input: `{ "name", "email", "password", "role"? }`; `role` is matched
/// case-insensitively and defaults to `USER`.
///
/// Output: `{ "message", "userId", "token", "refreshToken" }`
pub async fn register_post(
    State(state): State<AppState>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let account = state.accounts.register(input).await?;

    Ok(Json(json!({
        "message": "User registered successfully",
        "userId": account.user_id,
        "token": account.token,
        "refreshToken": account.refresh_token,
    })))
}
