//! txenrich Web Server
//!
//! Axum-based REST API for the transaction enrichment service.
//!
//! - Permissive CORS with preflight support
//! - Optional API-key authentication (`/health` is always open)
//! - Malformed JSON answered with a JSON 400, internal faults with a generic 500
//! - Single-transaction history persisted by a background writer

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use txenrich_core::{Enricher, Error as CoreError};

mod handlers;

/// Environment variable holding comma-separated API keys
pub const API_KEYS_ENV: &str = "TXENRICH_API_KEYS";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Paths reachable without credentials
const OPEN_PATHS: &[&str] = &["/health"];

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Bearer keys accepted by the API; empty disables authentication
    pub api_keys: Vec<String>,
}

impl ServerConfig {
    /// Read API keys from `TXENRICH_API_KEYS`
    pub fn from_env() -> Self {
        Self {
            api_keys: std::env::var(API_KEYS_ENV)
                .map(|v| parse_api_keys(&v))
                .unwrap_or_default(),
        }
    }

    pub fn require_auth(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

/// Split a comma-separated key list, dropping blanks
pub fn parse_api_keys(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub enricher: Arc<Enricher>,
    pub config: ServerConfig,
}

/// Authentication middleware - validates Bearer API keys when any are configured
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth() || OPEN_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    // Constant-time comparison to prevent timing attacks
    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid API key");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time comparison
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Create the application router
pub fn create_router(enricher: Arc<Enricher>, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        enricher,
        config,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // Enrichment
        .route("/enrich", post(handlers::enrich))
        .route("/enrich/batch", post(handlers::enrich_batch))
        // Merchants
        .route("/merchant/search", get(handlers::search_merchant))
        .route("/merchant/:guid", get(handlers::get_merchant))
        // Subscriptions
        .route("/subscriptions", get(handlers::list_subscriptions))
        .route(
            "/subscriptions/:id",
            axum::routing::delete(handlers::cancel_subscription),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server
///
/// Attaches the background history writer, so it must run inside the tokio
/// runtime that serves requests.
pub async fn serve(
    enricher: Enricher,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if config.require_auth() {
        info!("API key authentication enabled ({} keys)", config.api_keys.len());
    } else {
        warn!("⚠️  Authentication disabled - set {} before exposing to a network", API_KEYS_ENV);
    }

    let enricher = Arc::new(enricher.with_history_writer());
    let app = create_router(enricher, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(&rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

/// Validation failures become 400, missing records 404, everything else a generic 500
impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) => Self::bad_request(&msg),
            CoreError::NotFound(msg) => Self::not_found(&msg),
            other => Self::internal(other.into()),
        }
    }
}
