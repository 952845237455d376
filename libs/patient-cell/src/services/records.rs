use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::PatientError;
use crate::models::{CreateMedicalRecordRequest, MedicalRecord};

type Result<T> = std::result::Result<T, PatientError>;

pub struct MedicalRecordService {
    supabase: SupabaseClient,
}

impl MedicalRecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn add_record(
        &self,
        patient_id: &str,
        request: CreateMedicalRecordRequest,
        auth_token: &str,
    ) -> Result<MedicalRecord> {
        debug!("Adding medical record for patient {}", patient_id);

        if request.record_type.trim().is_empty() {
            return Err(PatientError::Validation(
                "Record type must not be empty".to_string(),
            ));
        }
        self.ensure_patient_exists(patient_id, auth_token).await?;

        let record_data = json!({
            "patient_id": patient_id,
            "record_type": request.record_type,
            "description": request.description,
            "diagnosis": request.diagnosis,
            "prescription": request.prescription,
            "record_date": request.record_date,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/medical_records",
                Some(auth_token),
                Some(record_data),
                Some(representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::Database("Failed to create record".to_string()))?;

        parse_record(row)
    }

    pub async fn get_record(&self, record_id: &str, auth_token: &str) -> Result<MedicalRecord> {
        let path = format!("/rest/v1/medical_records?id=eq.{}", record_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::NotFound("Medical record".to_string()))?;

        parse_record(row)
    }

    pub async fn list_records(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<MedicalRecord>> {
        self.ensure_patient_exists(patient_id, auth_token).await?;

        let path = format!(
            "/rest/v1/medical_records?patient_id=eq.{}&order=record_date.desc",
            patient_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result.into_iter().map(parse_record).collect()
    }

    pub async fn delete_record(&self, record_id: &str, auth_token: &str) -> Result<()> {
        debug!("Deleting medical record: {}", record_id);

        self.get_record(record_id, auth_token).await?;

        let path = format!("/rest/v1/medical_records?id=eq.{}", record_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        Ok(())
    }

    async fn ensure_patient_exists(&self, patient_id: &str, auth_token: &str) -> Result<()> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id", patient_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if rows.is_empty() {
            return Err(PatientError::NotFound("Patient".to_string()));
        }
        Ok(())
    }
}

fn parse_record(row: Value) -> Result<MedicalRecord> {
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
