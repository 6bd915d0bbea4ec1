use axum::{extract::State, response::Json};

use crate::app::AppState;
use crate::database::Note;
use crate::error::ApiResult;

/// GET /notes/public - Every PUBLIC note, no authentication
pub async fn public_get(State(state): State<AppState>) -> ApiResult<Json<Vec<Note>>> {
    Ok(Json(state.notes.list_public().await?))
}
