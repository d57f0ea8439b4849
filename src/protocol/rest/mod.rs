//! HTTP API Module
//!
//! Provides the REST server fronting the cleanup core: upload/session
//! endpoints for the request path and the cleanup control surface for
//! operators. Startup spawns the background cleanup scheduler; graceful
//! shutdown stops it and waits for any in-flight pass.

pub mod dto;
pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::config::{Config, HttpConfig};
use crate::protocol::Handler;

use self::handlers::{admin, cleanup, files};

/// Middleware: bearer-token authentication.
/// Checks for `Authorization: Bearer <key>` header.
/// Skips auth for /health (probes must work unauthenticated).
async fn auth_middleware(
    Extension(api_keys): Extension<ApiKeys>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // Health probe is always public
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let keys = &api_keys.0;
    if keys.is_empty() {
        // No API keys configured — auth not enforced
        return next.run(req).await;
    }

    if let Some(auth_header) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                if keys.iter().any(|k| k == token) {
                    return next.run(req).await;
                }
            }
        }
    }

    (StatusCode::UNAUTHORIZED, "Invalid or missing API key").into_response()
}

#[derive(Clone)]
struct ApiKeys(Arc<Vec<String>>);

/// Creates the Axum router
pub fn create_router(handler: Arc<Handler>, config: &Config) -> Router {
    // Build CORS layer
    let http = &config.http;
    let cors = if !http.cors_origins.is_empty() {
        // Explicit origins configured: restrict to those
        let origins: Vec<_> = http
            .cors_origins
            .iter()
            .filter_map(|s| {
                let parsed = s.parse();
                if parsed.is_err() {
                    tracing::warn!(origin = s, "invalid CORS origin ignored");
                }
                parsed.ok()
            })
            .collect();
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if http.cors_allow_all {
        // Explicit dev mode opt-in: allow all origins
        Some(CorsLayer::permissive())
    } else {
        // Default: same-origin only (no CORS layer = Axum denies cross-origin)
        None
    };

    // Allow a little multipart framing overhead on top of the file limit
    let body_limit = config.max_upload_bytes() + 64 * 1024;

    let mut app = Router::new()
        .route("/health", get(admin::health))
        .route("/api/cleanup/status", get(cleanup::status))
        .route("/api/cleanup/config", get(cleanup::config))
        .route("/api/cleanup/force", post(cleanup::force))
        .route("/api/cleanup/session/:id", delete(cleanup::delete_session))
        .route("/api/files/upload", post(files::upload))
        .route("/api/files/session/:id", get(files::get_session))
        .route("/api/files/session/:id/charts", put(files::attach_charts))
        .route(
            "/api/files/session/:id/charts/download",
            get(files::download_charts),
        )
        .route("/api/sessions", get(files::list_sessions))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(Extension(handler));

    // Apply authentication middleware (if enabled)
    // Note: Extension must be the OUTER layer (applied last) so the middleware can extract it.
    // In Axum, .layer(A).layer(B) means B wraps A, so B runs first.
    if http.auth.enabled && !http.auth.api_keys.is_empty() {
        let api_keys = ApiKeys(Arc::new(http.auth.api_keys.clone()));
        app = app
            .layer(middleware::from_fn(auth_middleware))
            .layer(Extension(api_keys));
    } else {
        app = app.layer(Extension(ApiKeys(Arc::new(Vec::new()))));
    }

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Spawns the background cleanup scheduler when enabled. Listens for
/// SIGINT (ctrl-c) and SIGTERM; on shutdown it stops accepting
/// connections, then stops the scheduler, waiting for any in-flight
/// cleanup pass to finish.
pub async fn start_http_server(
    handler: Arc<Handler>,
    http_config: &HttpConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(handler.clone(), handler.config());

    if handler.config().cleanup.enabled {
        handler.scheduler().start();
    } else {
        info!("automatic cleanup disabled by configuration");
    }

    let addr: SocketAddr = format!("{}:{}", http_config.host, http_config.port).parse()?;

    info!(%addr, "HTTP server listening");

    let socket = tokio::net::TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the cleanup loop; waits for an in-flight pass to finish
    handler.scheduler().stop().await;
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
