use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{PasswordError, PasswordHasher, TokenError, TokenService};
use crate::database::{CredentialStore, NewUser, Role, StoreError};

use super::validation::{self, FieldErrors};

#[derive(Debug, Default, Deserialize)]
pub struct Registration {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Debug)]
pub struct RegisteredAccount {
    pub user_id: i32,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Invalid input: {0:?}")]
    Validation(FieldErrors),
    #[error("Email already exists")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("No refresh token provided")]
    MissingRefreshToken,
    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Registration, login and token refresh.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    passwords: PasswordHasher,
    tokens: TokenService,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        passwords: PasswordHasher,
        tokens: TokenService,
    ) -> Self {
        Self {
            store,
            passwords,
            tokens,
        }
    }

    pub async fn register(&self, input: Registration) -> Result<RegisteredAccount, AccountError> {
        let new_user = self.validate_registration(&input)?;

        // Fast path only; the unique constraint decides races below.
        if self.store.find_user_by_email(&new_user.email).await?.is_some() {
            info!("Registration refused, email already exists: {}", new_user.email);
            return Err(AccountError::EmailTaken);
        }

        let password = input.password.as_deref().unwrap_or_default();
        let new_user = NewUser {
            password_hash: self.passwords.hash(password).await?,
            ..new_user
        };

        let user = match self.store.create_user(new_user).await {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => {
                info!("Registration lost a race on an existing email");
                return Err(AccountError::EmailTaken);
            }
            Err(e) => return Err(e.into()),
        };

        info!("Registered user {} <{}> as {}", user.id, user.email, user.role);
        Ok(RegisteredAccount {
            user_id: user.id,
            token: self.tokens.issue_access_token(&user)?,
            refresh_token: self.tokens.issue_refresh_token(user.id)?,
        })
    }

    pub async fn login(&self, input: Credentials) -> Result<TokenPair, AccountError> {
        let mut errors = FieldErrors::new();
        let email = validation::require(&mut errors, "email", input.email.as_deref());
        let password = validation::require(&mut errors, "password", input.password.as_deref());
        let (Some(email), Some(password)) = (email, password) else {
            return Err(AccountError::Validation(errors));
        };

        let Some(user) = self.store.find_user_by_email(email).await? else {
            self.passwords.verify_dummy(password).await;
            info!("Login failed for {}", email);
            return Err(AccountError::InvalidCredentials);
        };

        if !self.passwords.verify(password, &user.password_hash).await {
            info!("Login failed for {}", email);
            return Err(AccountError::InvalidCredentials);
        }

        info!("Login succeeded for {}", email);
        Ok(TokenPair {
            token: self.tokens.issue_access_token(&user)?,
            refresh_token: self.tokens.issue_refresh_token(user.id)?,
        })
    }

    /// Exchange a refresh token for a new access token built from the
    /// current user record.
    pub async fn refresh(&self, input: RefreshRequest) -> Result<String, AccountError> {
        let token = input
            .refresh_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(AccountError::MissingRefreshToken)?;

        let claims = self
            .tokens
            .verify_refresh(&token)
            .map_err(|_| AccountError::InvalidRefreshToken)?;

        let Some(user) = self.store.find_user_by_id(claims.user_id).await? else {
            warn!("Refresh token presented for missing user {}", claims.user_id);
            return Err(AccountError::InvalidRefreshToken);
        };

        Ok(self.tokens.issue_access_token(&user)?)
    }

    /// Everything except the password hash, which is filled in after the
    /// duplicate check.
    fn validate_registration(&self, input: &Registration) -> Result<NewUser, AccountError> {
        let mut errors = FieldErrors::new();

        let name = validation::require(&mut errors, "name", input.name.as_deref());
        if let Some(Err(msg)) = name.map(validation::validate_name) {
            errors.insert("name".to_string(), msg);
        }

        let email = validation::require(&mut errors, "email", input.email.as_deref());
        if let Some(Err(msg)) = email.map(validation::validate_email_format) {
            errors.insert("email".to_string(), msg);
        }

        let password = validation::require(&mut errors, "password", input.password.as_deref());
        if let Some(Err(msg)) = password.map(validation::validate_password) {
            errors.insert("password".to_string(), msg);
        }

        let role = match input.role.as_deref() {
            None => Role::User,
            Some(raw) => raw.parse::<Role>().unwrap_or_else(|msg| {
                errors.insert("role".to_string(), msg);
                Role::User
            }),
        };

        match (name, email) {
            (Some(name), Some(email)) if errors.is_empty() => Ok(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash: String::new(),
                role,
            }),
            _ => Err(AccountError::Validation(errors)),
        }
    }
}
