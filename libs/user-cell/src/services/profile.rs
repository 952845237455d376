use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::UserError;
use crate::models::{UpsertProfileRequest, UserProfile};

type Result<T> = std::result::Result<T, UserError>;

pub struct ProfileService {
    supabase: SupabaseClient,
}

impl ProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_profile(&self, user_id: &str, auth_token: &str) -> Result<UserProfile> {
        let path = format!("/rest/v1/user_profiles?user_id=eq.{}", user_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| UserError::NotFound("Profile".to_string()))?;

        parse_profile(row)
    }

    /// Creates the profile on first write, updates it afterwards.
    pub async fn upsert_profile(
        &self,
        user_id: &str,
        request: UpsertProfileRequest,
        auth_token: &str,
    ) -> Result<UserProfile> {
        debug!("Upserting profile for user: {}", user_id);

        validate_profile(&request)?;

        let exists = {
            let path = format!("/rest/v1/user_profiles?user_id=eq.{}&select=id", user_id);
            let rows: Vec<Value> = self
                .supabase
                .request(Method::GET, &path, Some(auth_token), None)
                .await?;
            !rows.is_empty()
        };

        let mut body = serde_json::Map::new();
        body.insert("first_name".to_string(), json!(request.first_name));
        body.insert("last_name".to_string(), json!(request.last_name));
        body.insert("phone".to_string(), json!(request.phone));
        body.insert("address".to_string(), json!(request.address));
        body.insert("date_of_birth".to_string(), json!(request.date_of_birth));
        body.insert("gender".to_string(), json!(request.gender));
        body.insert("photo_url".to_string(), json!(request.photo_url));
        body.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let result: Vec<Value> = if exists {
            let path = format!("/rest/v1/user_profiles?user_id=eq.{}", user_id);
            self.supabase
                .request_with_headers(
                    Method::PATCH,
                    &path,
                    Some(auth_token),
                    Some(Value::Object(body)),
                    Some(representation_headers()),
                )
                .await?
        } else {
            body.insert("user_id".to_string(), json!(user_id));
            body.insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));
            self.supabase
                .request_with_headers(
                    Method::POST,
                    "/rest/v1/user_profiles",
                    Some(auth_token),
                    Some(Value::Object(body)),
                    Some(representation_headers()),
                )
                .await?
        };

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| UserError::Database("Failed to save profile".to_string()))?;

        parse_profile(row)
    }

    pub async fn delete_profile(&self, user_id: &str, auth_token: &str) -> Result<()> {
        self.get_profile(user_id, auth_token).await?;

        let path = format!("/rest/v1/user_profiles?user_id=eq.{}", user_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        Ok(())
    }
}

fn parse_profile(row: Value) -> Result<UserProfile> {
    serde_json::from_value(row).map_err(|e| UserError::Database(e.to_string()))
}

fn validate_profile(request: &UpsertProfileRequest) -> Result<()> {
    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return Err(UserError::Validation(
            "First and last name must not be empty".to_string(),
        ));
    }
    if let Some(date_of_birth) = request.date_of_birth {
        if date_of_birth > Utc::now().date_naive() {
            return Err(UserError::Validation(
                "Date of birth cannot be in the future".to_string(),
            ));
        }
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
