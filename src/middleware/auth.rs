use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::AccessClaims;
use crate::database::Role;
use crate::error::ApiError;

/// Authenticated principal extracted from the access token
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<AccessClaims> for AuthUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            email: claims.useremail,
            role: claims.role,
        }
    }
}

/// Bearer token gate for protected routes.
///
/// No usable token is 401; a token that fails verification for any reason is 403.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers()).map_err(ApiError::unauthorized)?;

    let claims = state
        .tokens
        .verify_access(token)
        .map_err(|_| ApiError::forbidden("Invalid or expired token"))?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Extract the token from `Authorization: Bearer <token>`
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must use Bearer token format")?;

    if token.trim().is_empty() {
        return Err("Empty bearer token");
    }
    Ok(token.trim())
}
