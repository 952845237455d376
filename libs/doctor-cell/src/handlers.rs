use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AvailabilityQuery, CreateDoctorRequest, DoctorListQuery, UpdateDoctorRequest};
use crate::services::DoctorService;

/// Admin may manage any doctor profile; a doctor only their own.
async fn ensure_can_manage_doctor(
    service: &DoctorService,
    user: &User,
    doctor_id: &str,
    token: &str,
) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    let doctor = service.get_doctor(doctor_id, token).await?;
    if doctor.user_id.to_string() != user.id {
        return Err(AppError::Auth(
            "Not authorized to manage this doctor profile".to_string(),
        ));
    }
    Ok(())
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctor = service
        .get_doctor(&doctor_id, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctors = service
        .list_doctors(query, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn check_doctor_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let available = service
        .is_doctor_available(&doctor_id, query.date, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "available": available
    })))
}

#[axum::debug_handler]
pub async fn get_completed_appointments_count(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let count = service
        .completed_appointments_count(&doctor_id, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "completed_appointments": count
    })))
}

// ==============================================================================
// PROTECTED HANDLERS (PROFILE MANAGEMENT)
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Administrator role required".to_string(),
        ));
    }

    let service = DoctorService::new(&state);
    let doctor = service.create_doctor(request, auth.token()).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_own_doctor_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctor = service.get_doctor_by_user(&user.id, auth.token()).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = DoctorService::new(&state);

    ensure_can_manage_doctor(&service, &user, &doctor_id, token).await?;

    let doctor = service.update_doctor(&doctor_id, request, token).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Administrator role required".to_string(),
        ));
    }

    let service = DoctorService::new(&state);
    service.delete_doctor(&doctor_id, auth.token()).await?;

    Ok(Json(json!({ "success": true })))
}
