use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Builds the HTTP surface over the session manager.
pub fn router(state: AppState) -> Router {
    let open_routes = Router::new()
        .route("/api/session/heartbeat", post(handlers::sessions::heartbeat))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/session", get(handlers::sessions::current_session))
        .route("/api/session/all", get(handlers::sessions::list_sessions))
        .route("/api/session/logout", post(handlers::sessions::logout))
        .route("/api/session/logout-all", post(handlers::sessions::logout_all))
        .route("/api/vault", get(handlers::vault::list_entries))
        .route(
            "/api/vault/{data_type}",
            get(handlers::vault::get_entry)
                .put(handlers::vault::put_entry)
                .delete(handlers::vault::delete_entry),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(open_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::default())
                        .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                        .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
                )
                .layer(CookieManagerLayer::new()),
        )
}
