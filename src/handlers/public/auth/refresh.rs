// handlers/public/auth/refresh.rs - POST /refresh-token

use axum::{extract::rejection::JsonRejection, extract::State, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiResult;
use crate::services::RefreshRequest;

pub async fn refresh_post(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let access_token = state.accounts.refresh(input).await?;

    Ok(Json(json!({ "accessToken": access_token })))
}
