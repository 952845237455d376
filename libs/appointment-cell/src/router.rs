use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // Every appointment route requires authentication; role checks live in
    // handlers.
    Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", delete(handlers::delete_appointment))
        .route(
            "/{appointment_id}/status",
            patch(handlers::update_appointment_status),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route(
            "/{appointment_id}/reschedule",
            put(handlers::reschedule_appointment),
        )
        .route(
            "/doctors/{doctor_id}",
            get(handlers::get_doctor_appointments),
        )
        .route(
            "/patients/{patient_id}",
            get(handlers::get_patient_appointments),
        )
        .route("/status/{status}", get(handlers::get_appointments_by_status))
        .route("/date/{date}", get(handlers::get_appointments_by_date))
        .route("/conflicts", get(handlers::check_appointment_conflicts))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
