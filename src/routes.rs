use crate::config::session::SessionLayer;
use crate::{auth, handlers, AppState};
use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn build_router(app_state: AppState, session_layer: SessionLayer) -> Router {
    let protected_routes = Router::new()
        .route("/me", get(handlers::me_handler))
        .layer(middleware::from_fn(auth::require_auth));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/magic-link/request",
            post(handlers::request_magic_link_handler),
        )
        .route(
            "/magic-link/authenticate",
            get(handlers::authenticate_magic_link_handler),
        )
        .route("/logout", get(handlers::logout_handler))
        .merge(protected_routes)
        .layer(session_layer)
        .layer(middleware::from_fn(add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn add_security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    // Keep tokens in the URL from leaking to third parties.
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));

    response
}
