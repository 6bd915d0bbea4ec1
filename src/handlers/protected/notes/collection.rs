use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    Extension,
};

use crate::app::AppState;
use crate::database::Note;
use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::services::NoteInput;

/// GET /notes - The caller's own notes
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Note>>> {
    Ok(Json(state.notes.list_mine(user.user_id).await?))
}

/// POST /notes - Create a note owned by the caller
pub async fn post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<NoteInput>, JsonRejection>,
) -> ApiResult<Json<Note>> {
    let Json(input) = payload?;
    Ok(Json(state.notes.create(user.user_id, input).await?))
}

/// GET /notes/private - The caller's PRIVATE notes
pub async fn private_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Note>>> {
    Ok(Json(state.notes.list_private(user.user_id).await?))
}
