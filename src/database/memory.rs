use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CredentialStore, NewNote, NewUser, Note, NoteChanges, StoreError, User, Visibility};

/// In-memory store for tests and local development without Postgres.
///
/// Ids are assigned sequentially from 1. Email uniqueness is checked and the
/// row inserted under the same write lock, which gives the same guarantee as
/// the `UNIQUE` constraint in Postgres.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    notes: BTreeMap<i32, Note>,
    next_user_id: i32,
    next_note_id: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.inner.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }

        let id = next_id(&mut tables.next_user_id);
        let created = User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
        };
        tables.users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_note_by_id(&self, id: i32) -> Result<Option<Note>, StoreError> {
        Ok(self.inner.read().await.notes.get(&id).cloned())
    }

    async fn find_notes_by_user(&self, user_id: i32) -> Result<Vec<Note>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .notes
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_notes_by_user_and_visibility(
        &self,
        user_id: i32,
        visibility: Visibility,
    ) -> Result<Vec<Note>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .notes
            .values()
            .filter(|n| n.user_id == user_id && n.visibility == visibility)
            .cloned()
            .collect())
    }

    async fn find_public_notes(&self) -> Result<Vec<Note>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .notes
            .values()
            .filter(|n| n.visibility == Visibility::Public)
            .cloned()
            .collect())
    }

    async fn create_note(&self, note: NewNote) -> Result<Note, StoreError> {
        let mut tables = self.inner.write().await;
        // Mirrors the foreign key on notes.user_id
        if !tables.users.contains_key(&note.user_id) {
            return Err(StoreError::MissingReference("notes_user_id_fkey".to_string()));
        }

        let id = next_id(&mut tables.next_note_id);
        let created = Note {
            id,
            title: note.title,
            description: note.description,
            visibility: note.visibility,
            tags: note.tags,
            user_id: note.user_id,
        };
        tables.notes.insert(id, created.clone());
        Ok(created)
    }

    async fn update_note(
        &self,
        id: i32,
        owner_id: i32,
        changes: NoteChanges,
    ) -> Result<Option<Note>, StoreError> {
        let mut tables = self.inner.write().await;
        let Some(note) = tables.notes.get_mut(&id).filter(|n| n.user_id == owner_id) else {
            return Ok(None);
        };

        note.title = changes.title;
        note.description = changes.description;
        note.visibility = changes.visibility;
        note.tags = changes.tags;
        Ok(Some(note.clone()))
    }

    async fn delete_note(&self, id: i32, owner_id: i32) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        let owned = tables
            .notes
            .get(&id)
            .is_some_and(|n| n.user_id == owner_id);
        if owned {
            tables.notes.remove(&id);
        }
        Ok(owned)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::User,
        }
    }

    fn new_note(user_id: i32, title: &str, visibility: Visibility) -> NewNote {
        NewNote {
            user_id,
            title: title.into(),
            description: String::new(),
            visibility,
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@example.com")).await.unwrap();
        let err = store.create_user(new_user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Exact-string comparison: different casing is a different account
        assert!(store.create_user(new_user("A@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_duplicate_registrations_admit_one() {
        let store = MemoryStore::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create_user(new_user("race@example.com")).await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(StoreError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn filters_by_owner_and_visibility() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("alice@example.com")).await.unwrap();
        let bob = store.create_user(new_user("bob@example.com")).await.unwrap();

        store.create_note(new_note(alice.id, "a-pub", Visibility::Public)).await.unwrap();
        store.create_note(new_note(alice.id, "a-priv", Visibility::Private)).await.unwrap();
        store.create_note(new_note(bob.id, "b-priv", Visibility::Private)).await.unwrap();

        let mine = store.find_notes_by_user(alice.id).await.unwrap();
        assert_eq!(mine.iter().map(|n| n.title.as_str()).collect::<Vec<_>>(), ["a-pub", "a-priv"]);

        let public = store.find_public_notes().await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].title, "a-pub");

        let private = store
            .find_notes_by_user_and_visibility(bob.id, Visibility::Private)
            .await
            .unwrap();
        assert_eq!(private.len(), 1);
        assert_eq!(private[0].title, "b-priv");
    }

    #[tokio::test]
    async fn update_and_delete_require_owner() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("alice@example.com")).await.unwrap();
        let bob = store.create_user(new_user("bob@example.com")).await.unwrap();
        let note = store.create_note(new_note(alice.id, "mine", Visibility::Private)).await.unwrap();

        let changes = NoteChanges {
            title: "stolen".into(),
            ..NoteChanges::from(&note)
        };
        assert!(store.update_note(note.id, bob.id, changes.clone()).await.unwrap().is_none());
        assert!(!store.delete_note(note.id, bob.id).await.unwrap());

        let updated = store.update_note(note.id, alice.id, changes).await.unwrap().unwrap();
        assert_eq!(updated.title, "stolen");
        assert!(store.delete_note(note.id, alice.id).await.unwrap());
        assert!(store.find_note_by_id(note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn note_requires_existing_owner() {
        let store = MemoryStore::new();
        let err = store
            .create_note(new_note(42, "orphan", Visibility::Public))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)));
    }
}
