// handlers/public/auth/login.rs - POST /login

use axum::{extract::rejection::JsonRejection, extract::State, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiResult;
use crate::services::Credentials;

/// POST /login - Exchange email and password for a token pair
///
/// Unknown email and wrong password both answer 401 "Invalid credentials".
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let pair = state.accounts.login(input).await?;

    Ok(Json(json!({
        "token": pair.token,
        "refreshToken": pair.refresh_token,
    })))
}
