use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/{schedule_id}", get(handlers::get_schedule))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_schedules))
        .route(
            "/doctors/{doctor_id}/status/{status}",
            get(handlers::get_doctor_schedules_by_status),
        )
        .route(
            "/doctors/{doctor_id}/day/{day_of_week}",
            get(handlers::get_doctor_schedules_by_day),
        )
        .route(
            "/doctors/{doctor_id}/available",
            get(handlers::check_slot_availability),
        )
        .route(
            "/doctors/{doctor_id}/slots",
            get(handlers::get_available_slots),
        );

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/doctors/{doctor_id}", post(handlers::create_schedule))
        .route("/{schedule_id}", put(handlers::update_schedule))
        .route("/{schedule_id}", delete(handlers::delete_schedule))
        .route("/{schedule_id}/status", patch(handlers::update_schedule_status))
        .route(
            "/doctors/{doctor_id}/weekly",
            post(handlers::create_weekly_schedule),
        )
        .route(
            "/doctors/{doctor_id}/weekly",
            put(handlers::update_weekly_schedule),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
