use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{crypto::token, error::AppError, state::AppState};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// Extracts the session token from the request cookies.
pub fn extract_session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// A middleware that requires a valid session to be present.
///
/// On success the validated [`Session`](crate::models::session::Session) is placed in
/// the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(session_id) = extract_session_token(&cookies) else {
        tracing::debug!("❌ No session_id cookie found");
        return Err(AppError::Unauthorized);
    };

    let Some(session) = state.sessions.validate_session(&session_id).await? else {
        tracing::debug!("❌ Session {} is not valid", token::log_prefix(&session_id));
        return Err(AppError::Unauthorized);
    };

    tracing::debug!("✅ User authenticated: {}", session.user_id);

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
