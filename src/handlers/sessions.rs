use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_cookies::{
    cookie::{time::Duration, SameSite},
    Cookie, Cookies,
};

use crate::{
    crypto::token,
    error::{AppError, Result},
    middleware_layer::auth::{extract_session_token, SESSION_COOKIE},
    models::session::Session,
    state::AppState,
};

/// What a client may see about a session.
///
/// Never includes the full token of a session other than the caller's.
#[derive(Serialize, Debug)]
pub struct SessionView {
    pub id_prefix: String,
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub current: bool,
}

impl SessionView {
    fn new(session: &Session, current_id: &str) -> Self {
        Self {
            id_prefix: token::log_prefix(&session.session_id).to_string(),
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            display_name: session.display_name.clone(),
            created_at: session.created_at,
            last_activity: session.last_activity,
            expires_at: session.expires_at,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            current: session.session_id == current_id,
        }
    }
}

/// The response payload for logout requests.
#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub sessions_removed: usize,
}

/// Expires the session cookie on the client.
///
/// Carries the same attributes the cookie was issued with, `Secure` in production.
fn remove_session_cookie(cookies: &Cookies, production: bool) {
    let mut session_cookie = Cookie::new(SESSION_COOKIE, "");
    session_cookie.set_http_only(true);
    if production {
        session_cookie.set_secure(true);
    }
    session_cookie.set_same_site(SameSite::Lax);
    session_cookie.set_max_age(Duration::seconds(0));
    session_cookie.set_path("/");
    cookies.remove(session_cookie);
}

/// Returns the caller's session.
pub async fn current_session(Extension(session): Extension<Session>) -> Json<SessionView> {
    Json(SessionView::new(&session, &session.session_id))
}

/// Lists the caller's live sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<SessionView>>> {
    let sessions = state.sessions.list_user_sessions(&session.user_id).await?;
    Ok(Json(
        sessions
            .iter()
            .map(|s| SessionView::new(s, &session.session_id))
            .collect(),
    ))
}

/// Refreshes activity without the full validation path.
pub async fn heartbeat(State(state): State<AppState>, cookies: Cookies) -> Result<StatusCode> {
    let session_id = extract_session_token(&cookies).ok_or(AppError::Unauthorized)?;

    if state.sessions.update_activity(&session_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Unauthorized)
    }
}

/// Ends the caller's session.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    cookies: Cookies,
) -> Result<Response> {
    tracing::info!("👋 Logout for user: {}", session.user_id);

    let removed = state.sessions.destroy_session(&session.session_id).await?;
    remove_session_cookie(&cookies, state.config.production);

    let response = LogoutResponse {
        success: true,
        sessions_removed: usize::from(removed),
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Ends every session of the caller and wipes their stored data.
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    cookies: Cookies,
) -> Result<Response> {
    tracing::info!("👋 Logout everywhere for user: {}", session.user_id);

    let removed = state.sessions.destroy_user_sessions(&session.user_id).await?;
    remove_session_cookie(&cookies, state.config.production);

    let response = LogoutResponse {
        success: true,
        sessions_removed: removed,
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}
