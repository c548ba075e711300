pub mod auth;
pub mod blogs;
pub mod categories;
pub mod comments;
pub mod health;

use axum::http::{header, HeaderValue, Method, Uri};
use axum::middleware::from_fn_with_state;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::error::AppError;
use crate::rate_limit;
use crate::state::AppState;

/// Assemble the full application: health probes at the root, the JSON API
/// under `/api/v1`, request tracing and CORS around everything.
pub fn build_router(state: AppState) -> Router {
    let limited = state.config.rate_limit.enabled;

    let mut auth_routes = auth::router();
    if limited {
        auth_routes = auth_routes.layer(from_fn_with_state(
            state.limits.auth.clone(),
            rate_limit::enforce,
        ));
    }

    // Auth endpoints answer to their own, stricter limiter only.
    let mut content = Router::new()
        .merge(blogs::router())
        .merge(categories::router())
        .merge(comments::router());
    if limited {
        content = content.layer(from_fn_with_state(
            state.limits.api.clone(),
            rate_limit::enforce,
        ));
    }

    let api = Router::new().nest("/auth", auth_routes).merge(content);

    Router::new()
        .merge(health::router())
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors)),
        )
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Route not found: {}", uri.path()))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
