use crate::config::session::keys;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Json, Redirect},
};
use tower_sessions::Session;

/// The signed-in user. Routed behind `require_auth`.
pub async fn me_handler(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Json<User>> {
    let user_id = session
        .get::<i64>(keys::USER_ID)
        .await?
        .ok_or(AppError::AuthenticationRequired)?;

    match app_state.user_service.find_user_by_id(user_id).await? {
        Some(user) => Ok(Json(user)),
        None => {
            // Account removed while the session was alive.
            session.flush().await?;
            Err(AppError::AuthenticationRequired)
        }
    }
}

pub async fn logout_handler(session: Session) -> impl IntoResponse {
    let _ = session.flush().await;
    Redirect::to("/")
}

pub async fn health_handler(State(app_state): State<AppState>) -> Result<&'static str> {
    sqlx::query("SELECT 1").execute(&app_state.pool).await?;
    Ok("ok")
}
