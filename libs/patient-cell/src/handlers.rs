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

use crate::models::{
    BloodGroup, CreateMedicalRecordRequest, CreatePatientRequest, PatientListQuery,
    UpdatePatientRequest,
};
use crate::services::{MedicalRecordService, PatientService};

/// Clinic roles see any patient; a patient only their own record.
async fn ensure_can_access_patient(
    service: &PatientService,
    user: &User,
    patient_id: &str,
    token: &str,
) -> Result<(), AppError> {
    if user.has_any_role(&["admin", "staff", "doctor"]) {
        return Ok(());
    }

    let patient = service.get_patient(patient_id, token).await?;
    if patient.user_id.to_string() != user.id {
        return Err(AppError::Auth(
            "Not authorized to access this patient".to_string(),
        ));
    }
    Ok(())
}

fn ensure_clinic_staff(user: &User) -> Result<(), AppError> {
    if user.has_any_role(&["admin", "staff"]) {
        return Ok(());
    }
    Err(AppError::Auth(
        "Staff or administrator role required".to_string(),
    ))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_clinic_staff(&user)?;

    let service = PatientService::new(&state);
    let patient = service.create_patient(request, auth.token()).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = PatientService::new(&state);

    ensure_can_access_patient(&service, &user, &patient_id, token).await?;

    let patient = service.get_patient(&patient_id, token).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_own_patient_record(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);
    let patient = service.get_patient_by_user(&user.id, auth.token()).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<PatientListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(&["admin", "staff", "doctor"]) {
        return Err(AppError::Auth(
            "Not authorized to list patients".to_string(),
        ));
    }

    let service = PatientService::new(&state);
    let patients = service.list_patients(query, auth.token()).await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn list_blood_groups() -> Json<Value> {
    let groups: Vec<&str> = BloodGroup::ALL.iter().map(BloodGroup::as_str).collect();
    Json(json!({ "blood_groups": groups }))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = PatientService::new(&state);

    ensure_can_access_patient(&service, &user, &patient_id, token).await?;

    let patient = service.update_patient(&patient_id, request, token).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Administrator role required".to_string()));
    }

    let service = PatientService::new(&state);
    service.delete_patient(&patient_id, auth.token()).await?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// MEDICAL RECORDS
// ==============================================================================

#[axum::debug_handler]
pub async fn add_medical_record(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateMedicalRecordRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(&["admin", "doctor"]) {
        return Err(AppError::Auth(
            "Doctor or administrator role required".to_string(),
        ));
    }

    let service = MedicalRecordService::new(&state);
    let record = service
        .add_record(&patient_id, request, auth.token())
        .await?;

    Ok(Json(json!(record)))
}

#[axum::debug_handler]
pub async fn list_medical_records(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let patients = PatientService::new(&state);

    ensure_can_access_patient(&patients, &user, &patient_id, token).await?;

    let service = MedicalRecordService::new(&state);
    let records = service.list_records(&patient_id, token).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "records": records,
        "total": records.len()
    })))
}

#[axum::debug_handler]
pub async fn delete_medical_record(
    State(state): State<Arc<AppConfig>>,
    Path(record_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Administrator role required".to_string()));
    }

    let service = MedicalRecordService::new(&state);
    service.delete_record(&record_id, auth.token()).await?;

    Ok(Json(json!({ "success": true })))
}
