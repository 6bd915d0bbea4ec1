//! Password hashing with bcrypt.
//!
//! Digests are self-describing (`$2b$<cost>$<salt><hash>`), so verification
//! needs nothing but the stored string. Both operations are CPU-bound and run
//! on the blocking pool.

use std::sync::Arc;

use thiserror::Error;

/// bcrypt ignores everything past this many bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Plaintext hashed once at startup; login verifies against its digest when
/// the email is unknown so both failure paths cost one bcrypt round.
const DUMMY_PASSWORD: &str = "notes-api timing equalizer";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password exceeds {MAX_PASSWORD_BYTES} bytes")]
    TooLong,

    #[error("password hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_digest: Arc<str>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let dummy_digest = bcrypt::hash(DUMMY_PASSWORD, cost)?;
        Ok(Self {
            cost,
            dummy_digest: dummy_digest.into(),
        })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub async fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::TooLong);
        }

        let plaintext = plaintext.to_owned();
        let cost = self.cost;
        let digest = tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost)).await??;
        Ok(digest)
    }

    /// `true` only when `plaintext` produced `digest`. Mismatches, over-long
    /// input and unparseable digests all yield `false`.
    pub async fn verify(&self, plaintext: &str, digest: &str) -> bool {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return false;
        }

        let plaintext = plaintext.to_owned();
        let digest = digest.to_owned();
        match tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &digest)).await {
            Ok(Ok(matched)) => matched,
            Ok(Err(e)) => {
                tracing::warn!("Stored password digest could not be verified: {}", e);
                false
            }
            Err(e) => {
                tracing::error!("Password verification task failed: {}", e);
                false
            }
        }
    }

    /// Spend the same work as `verify` without a real account behind it.
    pub async fn verify_dummy(&self, plaintext: &str) -> bool {
        let digest = Arc::clone(&self.dummy_digest);
        self.verify(plaintext, &digest).await
    }
}
