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
    CreateUserRequest, EmailQuery, UpdateUserRequest, UpsertProfileRequest, UserListQuery,
    UserStatusQuery, UsernameQuery,
};
use crate::services::{ProfileService, UserService};

/// Users may read and edit their own account; admin and staff may touch any.
fn ensure_can_access_user(user: &User, user_id: &str) -> Result<(), AppError> {
    if user.is_admin() || user.is_staff() || user.id == user_id {
        return Ok(());
    }
    Err(AppError::Auth(
        "Not authorized to access this user".to_string(),
    ))
}

fn ensure_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }
    Err(AppError::Auth("Administrator role required".to_string()))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let service = UserService::new(&state);
    let account = service.create_user(request, auth.token()).await?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_access_user(&user, &user_id)?;

    let service = UserService::new(&state);
    let account = service.get_user(&user_id, auth.token()).await?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn get_user_by_username(
    State(state): State<Arc<AppConfig>>,
    Path(username): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&state);
    let account = service.get_user_by_username(&username, auth.token()).await?;

    ensure_can_access_user(&user, &account.id.to_string())?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<UserListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(&["admin", "staff"]) {
        return Err(AppError::Auth(
            "Not authorized to list users".to_string(),
        ));
    }

    let service = UserService::new(&state);
    let users = service.list_users(query, auth.token()).await?;

    Ok(Json(json!({
        "users": users,
        "total": users.len()
    })))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_access_user(&user, &user_id)?;

    // Role changes stay admin-only even on your own account.
    if request.role.is_some() {
        ensure_admin(&user)?;
    }

    let service = UserService::new(&state);
    let account = service.update_user(&user_id, request, auth.token()).await?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn update_user_status(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    Query(query): Query<UserStatusQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let service = UserService::new(&state);
    let account = service
        .update_status(&user_id, query.status, auth.token())
        .await?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let service = UserService::new(&state);
    service.delete_user(&user_id, auth.token()).await?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// PUBLIC HANDLERS (REGISTRATION PROBES)
// ==============================================================================

#[axum::debug_handler]
pub async fn check_username(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&state);
    let available = service
        .is_username_available(&query.username, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "username": query.username,
        "available": available
    })))
}

#[axum::debug_handler]
pub async fn check_email(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&state);
    let available = service
        .is_email_available(&query.email, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "email": query.email,
        "available": available
    })))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_access_user(&user, &user_id)?;

    let service = ProfileService::new(&state);
    let profile = service.get_profile(&user_id, auth.token()).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn upsert_profile(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertProfileRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_access_user(&user, &user_id)?;

    let service = ProfileService::new(&state);
    let profile = service
        .upsert_profile(&user_id, request, auth.token())
        .await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn delete_profile(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_access_user(&user, &user_id)?;

    let service = ProfileService::new(&state);
    service.delete_profile(&user_id, auth.token()).await?;

    Ok(Json(json!({ "success": true })))
}
