pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use models::{NewNote, NewUser, Note, NoteChanges, Role, User, Visibility};
pub use postgres::PgStore;

/// Errors from a `CredentialStore`
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (e.g. a duplicate email).
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// A foreign key pointed at a row that does not exist.
    #[error("Referenced row does not exist: {0}")]
    MissingReference(String),

    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence for users and notes.
///
/// Uniqueness of `users.email` is the store's responsibility: a duplicate
/// insert must fail with `StoreError::Conflict` even when two registrations
/// race past any application-level pre-check.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_note_by_id(&self, id: i32) -> Result<Option<Note>, StoreError>;

    /// All notes owned by `user_id`, ascending by id.
    async fn find_notes_by_user(&self, user_id: i32) -> Result<Vec<Note>, StoreError>;

    async fn find_notes_by_user_and_visibility(
        &self,
        user_id: i32,
        visibility: Visibility,
    ) -> Result<Vec<Note>, StoreError>;

    /// Every `PUBLIC` note regardless of owner, ascending by id.
    async fn find_public_notes(&self) -> Result<Vec<Note>, StoreError>;

    async fn create_note(&self, note: NewNote) -> Result<Note, StoreError>;

    /// Replace the note's fields when it exists and belongs to `owner_id`.
    /// Returns `None` otherwise.
    async fn update_note(
        &self,
        id: i32,
        owner_id: i32,
        changes: NoteChanges,
    ) -> Result<Option<Note>, StoreError>;

    /// Delete the note when it exists and belongs to `owner_id`; `false` otherwise.
    async fn delete_note(&self, id: i32, owner_id: i32) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    /// Release connections. Called once on shutdown.
    async fn close(&self);
}
