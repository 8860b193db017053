use crate::config::session::keys;
use crate::error::AppError;
use crate::handlers::magic_link_handlers::is_local_path;
use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

/// Rejects requests without a signed-in user.
///
/// For GET requests the original path is remembered so a later magic-link
/// sign-in can send the browser back to it.
pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_user_id)) = session.get::<i64>(keys::USER_ID).await {
        return next.run(request).await;
    }

    if request.method() == Method::GET {
        if let Some(path_and_query) = request.uri().path_and_query() {
            let target = path_and_query.as_str();
            if is_local_path(target) {
                if let Err(e) = session.insert(keys::RETURN_TO, target).await {
                    tracing::warn!("Failed to remember return path: {}", e);
                }
            }
        }
    }

    AppError::AuthenticationRequired.into_response()
}
