use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::config::DatabaseConfig;

use super::{CredentialStore, NewNote, NewUser, Note, NoteChanges, StoreError, User, Visibility};

/// Idempotent schema setup; each entry is executed as its own statement.
const SCHEMA: &[&str] = &[
    r#"DO $$ BEGIN
        CREATE TYPE user_role AS ENUM ('USER', 'ADMIN');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$"#,
    r#"DO $$ BEGIN
        CREATE TYPE note_visibility AS ENUM ('PUBLIC', 'PRIVATE');
    EXCEPTION WHEN duplicate_object THEN NULL;
    END $$"#,
    r#"CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role user_role NOT NULL DEFAULT 'USER'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS notes (
        id SERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        visibility note_visibility NOT NULL DEFAULT 'PRIVATE',
        tags TEXT[] NOT NULL DEFAULT '{}',
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
    )"#,
    "CREATE INDEX IF NOT EXISTS notes_user_id_idx ON notes (user_id)",
    "CREATE INDEX IF NOT EXISTS notes_visibility_idx ON notes (visibility)",
];

const USER_COLUMNS: &str = "id, name, email, password_hash, role";
const NOTE_COLUMNS: &str = "id, title, description, visibility, tags, user_id";

/// Postgres-backed store over a single shared pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected to database {}", redact_url(url));
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create enum types, tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema is up to date");
        Ok(())
    }
}

/// Map constraint violations to their `StoreError` kinds:
/// 23505 unique_violation, 23503 foreign_key_violation.
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or_default().to_string();
        match db_err.code().as_deref() {
            Some("23505") => return StoreError::Conflict(constraint),
            Some("23503") => return StoreError::MissingReference(constraint),
            _ => {}
        }
    }
    StoreError::Sqlx(err)
}

/// Strip the password from a connection string before it is logged.
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn find_note_by_id(&self, id: i32) -> Result<Option<Note>, StoreError> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(note)
    }

    async fn find_notes_by_user(&self, user_id: i32) -> Result<Vec<Note>, StoreError> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    async fn find_notes_by_user_and_visibility(
        &self,
        user_id: i32,
        visibility: Visibility,
    ) -> Result<Vec<Note>, StoreError> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE user_id = $1 AND visibility = $2
             ORDER BY id"
        ))
        .bind(user_id)
        .bind(visibility)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    async fn find_public_notes(&self) -> Result<Vec<Note>, StoreError> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE visibility = $1 ORDER BY id"
        ))
        .bind(Visibility::Public)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    async fn create_note(&self, note: NewNote) -> Result<Note, StoreError> {
        sqlx::query_as::<_, Note>(&format!(
            "INSERT INTO notes (title, description, visibility, tags, user_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {NOTE_COLUMNS}"
        ))
        .bind(&note.title)
        .bind(&note.description)
        .bind(note.visibility)
        .bind(&note.tags)
        .bind(note.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn update_note(
        &self,
        id: i32,
        owner_id: i32,
        changes: NoteChanges,
    ) -> Result<Option<Note>, StoreError> {
        // Ownership is re-checked in the WHERE clause so a concurrent delete or
        // a stale read can never update someone else's row.
        let note = sqlx::query_as::<_, Note>(&format!(
            "UPDATE notes
             SET title = $3, description = $4, visibility = $5, tags = $6
             WHERE id = $1 AND user_id = $2
             RETURNING {NOTE_COLUMNS}"
        ))
        .bind(id)
        .bind(owner_id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.visibility)
        .bind(&changes.tags)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(note)
    }

    async fn delete_note(&self, id: i32, owner_id: i32) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
