use crate::config::session::keys;
use crate::error::Result;
use crate::services::{user_service::normalize_email, MagicLinkError};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

const DEFAULT_REDIRECT: &str = "/me";

#[derive(Template, WebTemplate)]
#[template(path = "magic_link/check_email.html")]
struct CheckEmailTemplate {
    email: String,
    token_lifetime_minutes: i64,
}

#[derive(Template, WebTemplate)]
#[template(path = "magic_link/magic_error.html")]
struct MagicErrorTemplate {
    error: String,
}

#[derive(Deserialize)]
pub struct MagicLinkRequestForm {
    email: String,
}

#[derive(Deserialize)]
pub struct AuthenticateQuery {
    token: Option<String>,
}

pub async fn request_magic_link_handler(
    State(app_state): State<AppState>,
    Form(form): Form<MagicLinkRequestForm>,
) -> Result<Response> {
    let email = normalize_email(&form.email)?;

    let service = &app_state.magic_link_service;
    let (magic_link, token) = service.request(&email).await?;
    service.send(&magic_link, &token).await?;

    Ok(CheckEmailTemplate {
        email,
        token_lifetime_minutes: service.config().token_lifetime_minutes(),
    }
    .into_response())
}

pub async fn authenticate_magic_link_handler(
    State(app_state): State<AppState>,
    session: Session,
    Query(query): Query<AuthenticateQuery>,
) -> Result<Response> {
    let token = query.token.unwrap_or_default();

    let user = match app_state.magic_link_service.authenticate(&token).await {
        Ok(user) => user,
        Err(MagicLinkError::InvalidOrExpiredToken) => {
            let template = MagicErrorTemplate {
                error: MagicLinkError::InvalidOrExpiredToken.to_string(),
            };
            return Ok((StatusCode::UNAUTHORIZED, template).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    // New session id on privilege change.
    session.cycle_id().await?;
    session.insert(keys::USER_ID, user.id).await?;
    session.insert(keys::EMAIL, &user.email).await?;
    session
        .insert(keys::AUTH_TIMESTAMP, chrono::Utc::now().timestamp())
        .await?;

    let redirect_url = session
        .remove::<String>(keys::RETURN_TO)
        .await?
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| DEFAULT_REDIRECT.to_string());

    Ok(Redirect::to(&redirect_url).into_response())
}

/// Only same-origin absolute paths are accepted as redirect targets.
pub(crate) fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local_path() {
        assert!(is_local_path("/me"));
        assert!(is_local_path("/settings?tab=email"));
        assert!(!is_local_path("//evil.example"));
        assert!(!is_local_path("https://evil.example"));
        assert!(!is_local_path("/\\evil.example"));
        assert!(!is_local_path(""));
    }
}
