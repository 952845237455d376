use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::PatientError;
use crate::models::{CreatePatientRequest, Patient, PatientListQuery, UpdatePatientRequest};

type Result<T> = std::result::Result<T, PatientError>;

const DEFAULT_PAGE_SIZE: i32 = 20;

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        debug!("Creating patient record for user {}", request.user_id);

        self.ensure_no_record_for_user(&request.user_id.to_string(), auth_token)
            .await?;

        let patient_data = json!({
            "user_id": request.user_id,
            "blood_group": request.blood_group,
            "emergency_contact_name": request.emergency_contact_name,
            "emergency_contact_phone": request.emergency_contact_phone,
            "medical_history": request.medical_history,
            "allergies": request.allergies,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(auth_token),
                Some(patient_data),
                Some(representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::Database("Failed to create patient".to_string()))?;

        parse_patient(row)
    }

    pub async fn get_patient(&self, patient_id: &str, auth_token: &str) -> Result<Patient> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn get_patient_by_user(&self, user_id: &str, auth_token: &str) -> Result<Patient> {
        let path = format!("/rest/v1/patients?user_id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    /// Optional `search` matches against the owning account's username or
    /// email; `blood_group` filters directly on the patients table.
    pub async fn list_patients(
        &self,
        query: PatientListQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0);

        let mut path = format!(
            "/rest/v1/patients?order=created_at.desc&limit={}&offset={}",
            limit, offset
        );
        if let Some(blood_group) = query.blood_group {
            path.push_str(&format!("&blood_group=eq.{}", blood_group.as_str()));
        }
        if let Some(term) = query.search {
            let user_ids = self.matching_user_ids(&term, auth_token).await?;
            if user_ids.is_empty() {
                return Ok(vec![]);
            }
            path.push_str(&format!("&user_id=in.({})", user_ids.join(",")));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result.into_iter().map(parse_patient).collect()
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        debug!("Updating patient: {}", patient_id);

        self.get_patient(patient_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        if let Some(blood_group) = request.blood_group {
            update_data.insert("blood_group".to_string(), json!(blood_group));
        }
        if let Some(name) = request.emergency_contact_name {
            update_data.insert("emergency_contact_name".to_string(), json!(name));
        }
        if let Some(phone) = request.emergency_contact_phone {
            update_data.insert("emergency_contact_phone".to_string(), json!(phone));
        }
        if let Some(history) = request.medical_history {
            update_data.insert("medical_history".to_string(), json!(history));
        }
        if let Some(allergies) = request.allergies {
            update_data.insert("allergies".to_string(), json!(allergies));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
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
            .ok_or_else(|| PatientError::NotFound("Patient".to_string()))?;

        parse_patient(row)
    }

    pub async fn delete_patient(&self, patient_id: &str, auth_token: &str) -> Result<()> {
        debug!("Deleting patient: {}", patient_id);

        self.get_patient(patient_id, auth_token).await?;

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        Ok(())
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<Patient> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::NotFound("Patient".to_string()))?;

        parse_patient(row)
    }

    async fn ensure_no_record_for_user(&self, user_id: &str, auth_token: &str) -> Result<()> {
        let path = format!("/rest/v1/patients?user_id=eq.{}&select=id", user_id);
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if !existing.is_empty() {
            return Err(PatientError::Conflict(
                "A patient record already exists for this user".to_string(),
            ));
        }
        Ok(())
    }

    async fn matching_user_ids(&self, term: &str, auth_token: &str) -> Result<Vec<String>> {
        let path = format!(
            "/rest/v1/users?or=(username.ilike.*{term}*,email.ilike.*{term}*)&select=id"
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row["id"].as_str().map(str::to_string))
            .collect())
    }
}

fn parse_patient(row: Value) -> Result<Patient> {
    serde_json::from_value(row).map_err(|e| PatientError::Database(e.to_string()))
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}
