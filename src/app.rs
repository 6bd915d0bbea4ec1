use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{PasswordError, PasswordHasher, TokenService};
use crate::config::{AppConfig, SecurityConfig};
use crate::database::CredentialStore;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{protected, public};
use crate::middleware::require_bearer;
use crate::services::{AccountService, NoteService};

/// Shared handles for every request. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub accounts: AccountService,
    pub notes: NoteService,
    /// Same keys as the one inside `accounts`; read by `require_bearer`.
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<dyn CredentialStore>) -> Result<Self, PasswordError> {
        let passwords = PasswordHasher::new(config.security.bcrypt_cost)?;
        let tokens = TokenService::new(&config.security);

        Ok(Self {
            accounts: AccountService::new(Arc::clone(&store), passwords, tokens.clone()),
            notes: NoteService::new(Arc::clone(&store)),
            tokens,
            store,
        })
    }
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .route("/notes/public", get(public::notes_public_get))
        // Protected
        .merge(notes_routes(state.clone()))
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/register", post(auth::register_post))
        .route("/login", post(auth::login_post))
        .route("/refresh-token", post(auth::refresh_post))
}

fn notes_routes(state: AppState) -> Router<AppState> {
    use protected::notes;

    // `/notes/public` and `/notes/private` are static segments, which the
    // router always prefers over `/notes/:id`.
    Router::new()
        .route("/notes", get(notes::collection_get).post(notes::collection_post))
        .route("/notes/private", get(notes::private_get))
        .route(
            "/notes/:id",
            get(notes::record_get)
                .put(notes::record_put)
                .delete(notes::record_delete),
        )
        .route_layer(middleware::from_fn_with_state(state, require_bearer))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "message": "Notes API is running",
    }))
}

/// The only route that answers 503; store failures elsewhere are 500s.
async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("database unavailable")
    })?;
    Ok(Json(json!({ "status": "ok", "database": "ok" })))
}
