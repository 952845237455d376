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
    CreateScheduleRequest, ScheduleStatus, SlotAvailabilityQuery, SlotQuery, StatusQuery,
    UpdateScheduleRequest, WeeklyScheduleEntry,
};
use crate::services::ScheduleService;

/// Admin may manage any schedule; a doctor only their own.
async fn ensure_can_manage_doctor(
    service: &ScheduleService,
    user: &User,
    doctor_id: &str,
    token: &str,
) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    let owner = service.doctor_user_id(doctor_id, token).await?;
    if owner != user.id {
        return Err(AppError::Auth(
            "Not authorized to manage schedules for this doctor".to_string(),
        ));
    }
    Ok(())
}

async fn ensure_can_manage_schedule(
    service: &ScheduleService,
    user: &User,
    schedule_id: &str,
    token: &str,
) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    let schedule = service.get_schedule_by_id(schedule_id, token).await?;
    ensure_can_manage_doctor(service, user, &schedule.doctor_id.to_string(), token).await
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(schedule_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);

    let schedule = service
        .get_schedule_by_id(&schedule_id, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn get_doctor_schedules(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);

    let schedules = service
        .get_doctor_schedules(&doctor_id, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "schedules": schedules,
        "total": schedules.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_schedules_by_status(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, status)): Path<(String, ScheduleStatus)>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);

    let schedules = service
        .get_doctor_schedules_by_status(&doctor_id, status, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "status": status,
        "schedules": schedules
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_schedules_by_day(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, day_of_week)): Path<(String, u32)>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);

    let schedules = service
        .get_doctor_schedules_by_day(&doctor_id, day_of_week, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "day_of_week": day_of_week,
        "schedules": schedules
    })))
}

#[axum::debug_handler]
pub async fn check_slot_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotAvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);

    let available = service
        .is_slot_free(
            &doctor_id,
            query.day_of_week,
            query.start_time,
            query.end_time,
            query.date,
            &state.supabase_anon_key,
        )
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "day_of_week": query.day_of_week,
        "start_time": query.start_time.format("%H:%M").to_string(),
        "end_time": query.end_time.format("%H:%M").to_string(),
        "available": available
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);

    let slots = service
        .list_available_slots(&doctor_id, query.date, &state.supabase_anon_key)
        .await?;

    let slots: Vec<String> = slots
        .into_iter()
        .map(|slot| slot.format("%H:%M").to_string())
        .collect();

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "available_slots": slots,
        "total_slots": slots.len()
    })))
}

// ==============================================================================
// PROTECTED HANDLERS (SCHEDULE MANAGEMENT)
// ==============================================================================

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    ensure_can_manage_doctor(&service, &user, &doctor_id, token).await?;

    let schedule = service.create_schedule(&doctor_id, request, token).await?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(schedule_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    ensure_can_manage_schedule(&service, &user, &schedule_id, token).await?;

    let schedule = service.update_schedule(&schedule_id, request, token).await?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(schedule_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    ensure_can_manage_schedule(&service, &user, &schedule_id, token).await?;

    service.delete_schedule(&schedule_id, token).await?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn update_schedule_status(
    State(state): State<Arc<AppConfig>>,
    Path(schedule_id): Path<String>,
    Query(query): Query<StatusQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    ensure_can_manage_schedule(&service, &user, &schedule_id, token).await?;

    let schedule = service
        .update_schedule_status(&schedule_id, query.status, token)
        .await?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn create_weekly_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(entries): Json<Vec<WeeklyScheduleEntry>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    ensure_can_manage_doctor(&service, &user, &doctor_id, token).await?;

    let schedules = service
        .create_weekly_schedule(&doctor_id, entries, token)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "schedules": schedules,
        "total": schedules.len()
    })))
}

#[axum::debug_handler]
pub async fn update_weekly_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(entries): Json<Vec<WeeklyScheduleEntry>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    ensure_can_manage_doctor(&service, &user, &doctor_id, token).await?;

    let schedules = service
        .update_weekly_schedule(&doctor_id, entries, token)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "schedules": schedules,
        "total": schedules.len()
    })))
}
