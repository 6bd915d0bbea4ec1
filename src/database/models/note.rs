use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "note_visibility", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PUBLIC" => Ok(Visibility::Public),
            "PRIVATE" => Ok(Visibility::Private),
            other => Err(format!("Unknown visibility '{}': expected PUBLIC or PRIVATE", other)),
        }
    }
}

/// A note as stored and as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub user_id: i32,
}

#[derive(Debug, Clone)]
pub struct NewNote {
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub tags: Vec<String>,
}

/// Full replacement values for an update; merging happens before the store sees it.
#[derive(Debug, Clone)]
pub struct NoteChanges {
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub tags: Vec<String>,
}

impl From<&Note> for NoteChanges {
    fn from(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            description: note.description.clone(),
            visibility: note.visibility,
            tags: note.tags.clone(),
        }
    }
}
