use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::database::{CredentialStore, NewNote, Note, NoteChanges, StoreError, Visibility};

use super::validation::{self, FieldErrors};

/// Body of `POST /notes`.
#[derive(Debug, Default, Deserialize)]
pub struct NoteInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Body of `PUT /notes/:id`.
///
/// The outer `Option` is whether the key was sent at all, the inner one
/// whether it was `null`.
#[derive(Debug, Default, Deserialize)]
pub struct NotePatch {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub visibility: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub tags: Option<Option<Vec<String>>>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("Note not found")]
    NotFound,
    #[error("Note not found or unauthorized")]
    NotFoundOrUnauthorized,
    #[error("Invalid note: {0:?}")]
    Validation(FieldErrors),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Ownership and visibility rules for notes. Every operation takes the
/// caller's user id; notes owned by someone else are reported exactly like
/// notes that do not exist.
#[derive(Clone)]
pub struct NoteService {
    store: Arc<dyn CredentialStore>,
}

impl NoteService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, owner_id: i32, input: NoteInput) -> Result<Note, NoteError> {
        let mut errors = FieldErrors::new();
        let title = validation::require(&mut errors, "title", input.title.as_deref());
        let visibility = match input.visibility.as_deref() {
            None => Visibility::default(),
            Some(raw) => parse_visibility(raw, &mut errors),
        };

        let Some(title) = title.filter(|_| errors.is_empty()) else {
            return Err(NoteError::Validation(errors));
        };

        let note = self
            .store
            .create_note(NewNote {
                user_id: owner_id,
                title: title.to_string(),
                description: input.description.unwrap_or_default(),
                visibility,
                tags: input.tags.unwrap_or_default(),
            })
            .await?;

        tracing::debug!("User {} created note {}", owner_id, note.id);
        Ok(note)
    }

    pub async fn get(&self, owner_id: i32, id: i32) -> Result<Note, NoteError> {
        self.store
            .find_note_by_id(id)
            .await?
            .filter(|note| note.user_id == owner_id)
            .ok_or(NoteError::NotFound)
    }

    pub async fn list_mine(&self, owner_id: i32) -> Result<Vec<Note>, NoteError> {
        Ok(self.store.find_notes_by_user(owner_id).await?)
    }

    pub async fn list_public(&self) -> Result<Vec<Note>, NoteError> {
        Ok(self.store.find_public_notes().await?)
    }

    pub async fn list_private(&self, owner_id: i32) -> Result<Vec<Note>, NoteError> {
        Ok(self
            .store
            .find_notes_by_user_and_visibility(owner_id, Visibility::Private)
            .await?)
    }

    pub async fn update(&self, owner_id: i32, id: i32, patch: NotePatch) -> Result<Note, NoteError> {
        let current = self
            .store
            .find_note_by_id(id)
            .await?
            .filter(|note| note.user_id == owner_id)
            .ok_or(NoteError::NotFoundOrUnauthorized)?;

        let changes = merge(&current, patch)?;

        // The store re-checks ownership; a concurrent delete lands here.
        self.store
            .update_note(id, owner_id, changes)
            .await?
            .ok_or(NoteError::NotFoundOrUnauthorized)
    }

    pub async fn delete(&self, owner_id: i32, id: i32) -> Result<(), NoteError> {
        if self.store.delete_note(id, owner_id).await? {
            tracing::debug!("User {} deleted note {}", owner_id, id);
            Ok(())
        } else {
            Err(NoteError::NotFoundOrUnauthorized)
        }
    }
}

fn parse_visibility(raw: &str, errors: &mut FieldErrors) -> Visibility {
    raw.parse::<Visibility>().unwrap_or_else(|msg| {
        errors.insert("visibility".to_string(), msg);
        Visibility::default()
    })
}

/// Absent keys keep the stored value; `null` clears `description` and
/// `tags` but is refused for `title` and `visibility`.
fn merge(current: &Note, patch: NotePatch) -> Result<NoteChanges, NoteError> {
    let mut errors = FieldErrors::new();
    let mut changes = NoteChanges::from(current);

    if let Some(title) = patch.title {
        if let Some(title) = validation::require(&mut errors, "title", title.as_deref()) {
            changes.title = title.to_string();
        }
    }

    if let Some(description) = patch.description {
        changes.description = description.unwrap_or_default();
    }

    match patch.visibility {
        None => {}
        Some(None) => {
            errors.insert("visibility".to_string(), "Visibility cannot be null".to_string());
        }
        Some(Some(raw)) => changes.visibility = parse_visibility(&raw, &mut errors),
    }

    if let Some(tags) = patch.tags {
        changes.tags = tags.unwrap_or_default();
    }

    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(NoteError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, NewUser, Role};

    async fn setup() -> (NoteService, i32, i32) {
        let store = Arc::new(MemoryStore::new());
        let mut ids = Vec::new();
        for email in ["alice@example.com", "bob@example.com"] {
            let user = store
                .create_user(NewUser {
                    name: email.into(),
                    email: email.into(),
                    password_hash: "x".into(),
                    role: Role::User,
                })
                .await
                .unwrap();
            ids.push(user.id);
        }
        (NoteService::new(store), ids[0], ids[1])
    }

    fn input(title: &str, visibility: &str) -> NoteInput {
        NoteInput {
            title: Some(title.into()),
            visibility: Some(visibility.into()),
            ..Default::default()
        }
    }

    fn patch(json: serde_json::Value) -> NotePatch {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let (notes, alice, _) = setup().await;
        let note = notes
            .create(alice, NoteInput {
                title: Some("Groceries".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(note.user_id, alice);
        assert_eq!(note.description, "");
        assert_eq!(note.visibility, Visibility::Private);
        assert!(note.tags.is_empty());
    }

    #[tokio::test]
    async fn create_requires_title_and_known_visibility() {
        let (notes, alice, _) = setup().await;
        let err = notes.create(alice, input("  ", "friends")).await.unwrap_err();
        let NoteError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("visibility"));
    }

    #[tokio::test]
    async fn other_users_notes_look_missing() {
        let (notes, alice, bob) = setup().await;
        let public = notes.create(alice, input("shared", "public")).await.unwrap();

        assert!(matches!(notes.get(bob, public.id).await, Err(NoteError::NotFound)));
        assert!(matches!(notes.get(bob, 999).await, Err(NoteError::NotFound)));
        assert_eq!(notes.get(alice, public.id).await.unwrap().title, "shared");
    }

    #[tokio::test]
    async fn listings_are_scoped() {
        let (notes, alice, bob) = setup().await;
        notes.create(alice, input("a1", "PUBLIC")).await.unwrap();
        notes.create(alice, input("a2", "PRIVATE")).await.unwrap();
        notes.create(bob, input("b1", "PUBLIC")).await.unwrap();

        let titles = |v: Vec<Note>| v.into_iter().map(|n| n.title).collect::<Vec<_>>();
        assert_eq!(titles(notes.list_mine(alice).await.unwrap()), ["a1", "a2"]);
        assert_eq!(titles(notes.list_public().await.unwrap()), ["a1", "b1"]);
        assert_eq!(titles(notes.list_private(alice).await.unwrap()), ["a2"]);
        assert!(notes.list_private(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_merges_present_fields_only() {
        let (notes, alice, _) = setup().await;
        let note = notes
            .create(alice, NoteInput {
                title: Some("t".into()),
                description: Some("d".into()),
                visibility: Some("PUBLIC".into()),
                tags: Some(vec!["x".into()]),
            })
            .await
            .unwrap();

        let updated = notes
            .update(alice, note.id, patch(serde_json::json!({"title": "t2"})))
            .await
            .unwrap();
        assert_eq!(updated.title, "t2");
        assert_eq!(updated.description, "d");
        assert_eq!(updated.visibility, Visibility::Public);
        assert_eq!(updated.tags, ["x"]);

        let cleared = notes
            .update(alice, note.id, patch(serde_json::json!({"description": null, "tags": null})))
            .await
            .unwrap();
        assert_eq!(cleared.description, "");
        assert!(cleared.tags.is_empty());
        assert_eq!(cleared.title, "t2");
    }

    #[tokio::test]
    async fn update_refuses_null_title_or_visibility() {
        let (notes, alice, _) = setup().await;
        let note = notes.create(alice, input("t", "PRIVATE")).await.unwrap();

        for body in [
            serde_json::json!({"title": null}),
            serde_json::json!({"title": ""}),
            serde_json::json!({"visibility": null}),
        ] {
            let err = notes.update(alice, note.id, patch(body.clone())).await.unwrap_err();
            assert!(matches!(err, NoteError::Validation(_)), "{body}");
        }
    }

    #[tokio::test]
    async fn non_owner_update_and_delete_match_missing() {
        let (notes, alice, bob) = setup().await;
        let note = notes.create(alice, input("t", "PUBLIC")).await.unwrap();

        let stolen = notes.update(bob, note.id, patch(serde_json::json!({"title": "x"}))).await;
        let missing = notes.update(bob, 999, patch(serde_json::json!({"title": "x"}))).await;
        assert!(matches!(stolen, Err(NoteError::NotFoundOrUnauthorized)));
        assert!(matches!(missing, Err(NoteError::NotFoundOrUnauthorized)));

        assert!(matches!(notes.delete(bob, note.id).await, Err(NoteError::NotFoundOrUnauthorized)));
        notes.delete(alice, note.id).await.unwrap();
        assert!(matches!(notes.delete(alice, note.id).await, Err(NoteError::NotFoundOrUnauthorized)));
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let p = patch(serde_json::json!({"description": null}));
        assert_eq!(p.title, None);
        assert_eq!(p.description, Some(None));
    }
}
