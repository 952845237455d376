use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn user_routes(state: Arc<AppConfig>) -> Router {
    // Registration-time availability probes run before an account exists.
    let public_routes = Router::new()
        .route("/check-username", get(handlers::check_username))
        .route("/check-email", get(handlers::check_email));

    // Everything else requires authentication; role checks live in handlers.
    let protected_routes = Router::new()
        .route("/", post(handlers::create_user))
        .route("/", get(handlers::list_users))
        .route("/{user_id}", get(handlers::get_user))
        .route("/{user_id}", put(handlers::update_user))
        .route("/{user_id}", delete(handlers::delete_user))
        .route("/{user_id}/status", patch(handlers::update_user_status))
        .route("/username/{username}", get(handlers::get_user_by_username))
        .route("/{user_id}/profile", get(handlers::get_profile))
        .route("/{user_id}/profile", put(handlers::upsert_profile))
        .route("/{user_id}/profile", delete(handlers::delete_profile))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
