use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppConfig>) -> Router {
    // Blood group reference data is the only public route.
    let public_routes = Router::new().route("/blood-groups", get(handlers::list_blood_groups));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_patient))
        .route("/", get(handlers::list_patients))
        .route("/me", get(handlers::get_own_patient_record))
        .route("/{patient_id}", get(handlers::get_patient))
        .route("/{patient_id}", put(handlers::update_patient))
        .route("/{patient_id}", delete(handlers::delete_patient))
        .route("/{patient_id}/records", post(handlers::add_medical_record))
        .route("/{patient_id}/records", get(handlers::list_medical_records))
        .route("/records/{record_id}", delete(handlers::delete_medical_record))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
