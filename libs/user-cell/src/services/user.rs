use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::UserError;
use crate::models::{
    CreateUserRequest, UpdateUserRequest, UserAccount, UserListQuery, UserStatus,
};

type Result<T> = std::result::Result<T, UserError>;

const DEFAULT_PAGE_SIZE: i32 = 20;

pub struct UserService {
    supabase: SupabaseClient,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_user(
        &self,
        request: CreateUserRequest,
        auth_token: &str,
    ) -> Result<UserAccount> {
        debug!("Creating user account: {}", request.username);

        validate_email(&request.email)?;
        if request.username.trim().is_empty() {
            return Err(UserError::Validation("Username must not be empty".to_string()));
        }

        self.ensure_unique("username", &request.username, auth_token).await?;
        self.ensure_unique("email", &request.email, auth_token).await?;
        self.ensure_unique("keycloak_id", &request.keycloak_id, auth_token).await?;

        let user_data = json!({
            "username": request.username,
            "email": request.email,
            "keycloak_id": request.keycloak_id,
            "role": request.role.as_str(),
            "status": UserStatus::Active.as_str(),
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/users",
                Some(auth_token),
                Some(user_data),
                Some(representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| UserError::Database("Failed to create user".to_string()))?;

        parse_user(row)
    }

    pub async fn get_user(&self, user_id: &str, auth_token: &str) -> Result<UserAccount> {
        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn get_user_by_username(
        &self,
        username: &str,
        auth_token: &str,
    ) -> Result<UserAccount> {
        let path = format!("/rest/v1/users?username=eq.{}", username);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn list_users(
        &self,
        query: UserListQuery,
        auth_token: &str,
    ) -> Result<Vec<UserAccount>> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0);

        let mut path = format!(
            "/rest/v1/users?order=created_at.desc&limit={}&offset={}",
            limit, offset
        );
        if let Some(role) = query.role {
            path.push_str(&format!("&role=eq.{}", role.as_str()));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result.into_iter().map(parse_user).collect()
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        request: UpdateUserRequest,
        auth_token: &str,
    ) -> Result<UserAccount> {
        debug!("Updating user: {}", user_id);

        let existing = self.get_user(user_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        if let Some(username) = request.username {
            if username != existing.username {
                self.ensure_unique("username", &username, auth_token).await?;
            }
            update_data.insert("username".to_string(), json!(username));
        }
        if let Some(email) = request.email {
            validate_email(&email)?;
            if email != existing.email {
                self.ensure_unique("email", &email, auth_token).await?;
            }
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(role) = request.role {
            update_data.insert("role".to_string(), json!(role.as_str()));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| UserError::NotFound("User".to_string()))?;

        parse_user(row)
    }

    pub async fn update_status(
        &self,
        user_id: &str,
        status: UserStatus,
        auth_token: &str,
    ) -> Result<UserAccount> {
        debug!("Setting user {} status to {}", user_id, status.as_str());

        self.get_user(user_id, auth_token).await?;

        let update_data = json!({
            "status": status.as_str(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(update_data),
                Some(representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| UserError::NotFound("User".to_string()))?;

        parse_user(row)
    }

    pub async fn delete_user(&self, user_id: &str, auth_token: &str) -> Result<()> {
        debug!("Deleting user: {}", user_id);

        self.get_user(user_id, auth_token).await?;

        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        Ok(())
    }

    /// Registration-time probe: is the username still free?
    pub async fn is_username_available(&self, username: &str, auth_token: &str) -> Result<bool> {
        match self.ensure_unique("username", username, auth_token).await {
            Ok(()) => Ok(true),
            Err(UserError::Conflict(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Registration-time probe: is the email address still free?
    /// Malformed addresses are rejected rather than reported as taken.
    pub async fn is_email_available(&self, email: &str, auth_token: &str) -> Result<bool> {
        validate_email(email)?;
        match self.ensure_unique("email", email, auth_token).await {
            Ok(()) => Ok(true),
            Err(UserError::Conflict(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<UserAccount> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| UserError::NotFound("User".to_string()))?;

        parse_user(row)
    }

    async fn ensure_unique(&self, column: &str, value: &str, auth_token: &str) -> Result<()> {
        let path = format!("/rest/v1/users?{}=eq.{}&select=id", column, value);
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if !existing.is_empty() {
            return Err(UserError::Conflict(format!(
                "A user with this {} already exists",
                column
            )));
        }
        Ok(())
    }
}

fn parse_user(row: Value) -> Result<UserAccount> {
    serde_json::from_value(row).map_err(|e| UserError::Database(e.to_string()))
}

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

fn validate_email(email: &str) -> std::result::Result<(), UserError> {
    if !email_regex().is_match(email) {
        return Err(UserError::Validation(format!("Invalid email address: {}", email)));
    }
    Ok(())
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}
