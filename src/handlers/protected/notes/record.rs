use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
    Extension,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::Note;
use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::services::NotePatch;

use super::utils::parse_note_id;

/// GET /notes/:id - A single note, only if the caller owns it
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Note>> {
    let id = parse_note_id(&id)?;
    Ok(Json(state.notes.get(user.user_id, id).await?))
}

/// PUT /notes/:id - Merge the given fields into the caller's note
pub async fn put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<NotePatch>, JsonRejection>,
) -> ApiResult<Json<Note>> {
    let id = parse_note_id(&id)?;
    let Json(patch) = payload?;
    Ok(Json(state.notes.update(user.user_id, id, patch).await?))
}

/// DELETE /notes/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_note_id(&id)?;
    state.notes.delete(user.user_id, id).await?;
    Ok(Json(json!({ "message": "Note deleted successfully" })))
}
