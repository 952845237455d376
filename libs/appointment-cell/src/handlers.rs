use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentListQuery, AppointmentStatus, AppointmentStatusQuery, CancelRequest,
    ConflictQuery, CreateAppointmentRequest, RescheduleRequest,
};
use crate::services::AppointmentService;

/// Clinic roles touch any appointment; patients only their own bookings.
async fn ensure_can_access_appointment(
    service: &AppointmentService,
    user: &User,
    appointment_id: &str,
    token: &str,
) -> Result<(), AppError> {
    if user.has_any_role(&["admin", "staff", "doctor"]) {
        return Ok(());
    }

    let appointment = service.get_appointment(appointment_id, token).await?;
    let owner = service
        .patient_user_id(&appointment.patient_id.to_string(), token)
        .await?;
    if owner != user.id {
        return Err(AppError::Auth(
            "Not authorized to access this appointment".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(&["admin", "staff", "doctor", "patient"]) {
        return Err(AppError::Auth("Not authorized to book".to_string()));
    }

    let service = AppointmentService::new(&state);
    let appointment = service.create_appointment(request, auth.token()).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);

    ensure_can_access_appointment(&service, &user, &appointment_id, token).await?;

    let appointment = service.get_appointment(&appointment_id, token).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AppointmentListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(&["admin", "staff", "doctor"]) {
        return Err(AppError::Auth(
            "Not authorized to view doctor appointments".to_string(),
        ));
    }

    let service = AppointmentService::new(&state);
    let appointments = service
        .get_doctor_appointments(&doctor_id, query, auth.token())
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    Query(query): Query<AppointmentListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state);

    if !user.has_any_role(&["admin", "staff", "doctor"]) {
        let owner = service.patient_user_id(&patient_id, auth.token()).await?;
        if owner != user.id {
            return Err(AppError::Auth(
                "Not authorized to view these appointments".to_string(),
            ));
        }
    }

    let appointments = service
        .get_patient_appointments(&patient_id, query, auth.token())
        .await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointments_by_status(
    State(state): State<Arc<AppConfig>>,
    Path(status): Path<AppointmentStatus>,
    Query(query): Query<AppointmentListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(&["admin", "staff"]) {
        return Err(AppError::Auth(
            "Staff or administrator role required".to_string(),
        ));
    }

    let service = AppointmentService::new(&state);
    let appointments = service
        .get_appointments_by_status(status, query, auth.token())
        .await?;

    Ok(Json(json!({
        "status": status,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointments_by_date(
    State(state): State<Arc<AppConfig>>,
    Path(date): Path<NaiveDate>,
    Query(query): Query<AppointmentListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(&["admin", "staff"]) {
        return Err(AppError::Auth(
            "Staff or administrator role required".to_string(),
        ));
    }

    let service = AppointmentService::new(&state);
    let appointments = service
        .get_appointments_by_date(date, query, auth.token())
        .await?;

    Ok(Json(json!({
        "date": date,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ConflictQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(&["admin", "staff", "doctor"]) {
        return Err(AppError::Auth(
            "Not authorized to check conflicts".to_string(),
        ));
    }

    let service = AppointmentService::new(&state);
    let conflicted = service
        .has_conflicts(&query.doctor_id.to_string(), query.datetime, auth.token())
        .await?;

    Ok(Json(json!({
        "doctor_id": query.doctor_id,
        "datetime": query.datetime,
        "has_conflicts": conflicted
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    Query(query): Query<AppointmentStatusQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(&["admin", "staff", "doctor"]) {
        return Err(AppError::Auth(
            "Not authorized to change appointment status".to_string(),
        ));
    }

    let service = AppointmentService::new(&state);
    let appointment = service
        .update_status(&appointment_id, query.status, auth.token())
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);

    ensure_can_access_appointment(&service, &user, &appointment_id, token).await?;

    let appointment = service
        .cancel_appointment(&appointment_id, request.reason, token)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);

    ensure_can_access_appointment(&service, &user, &appointment_id, token).await?;

    let appointment = service
        .reschedule_appointment(&appointment_id, request, token)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Administrator role required".to_string()));
    }

    let service = AppointmentService::new(&state);
    service
        .delete_appointment(&appointment_id, auth.token())
        .await?;

    Ok(Json(json!({ "success": true })))
}
