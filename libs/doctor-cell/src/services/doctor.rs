use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use schedule_cell::services::ScheduleService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::DoctorError;
use crate::models::{CreateDoctorRequest, Doctor, DoctorListQuery, UpdateDoctorRequest};

type Result<T> = std::result::Result<T, DoctorError>;

const DEFAULT_PAGE_SIZE: i32 = 20;

/// Appointment statuses counted towards a doctor's completed total.
const COMPLETED_STATUS: &str = "completed";

pub struct DoctorService {
    supabase: SupabaseClient,
    schedules: ScheduleService,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            schedules: ScheduleService::new(config),
        }
    }

    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Creating doctor profile for user {}", request.user_id);

        validate_doctor_fields(
            &request.speciality,
            request.experience_years,
            request.consultation_fee,
        )?;
        if request.license_number.trim().is_empty() {
            return Err(DoctorError::Validation(
                "License number must not be empty".to_string(),
            ));
        }

        self.ensure_no_profile_for_user(&request.user_id.to_string(), auth_token)
            .await?;
        self.ensure_license_unused(&request.license_number, None, auth_token)
            .await?;

        let doctor_data = json!({
            "user_id": request.user_id,
            "speciality": request.speciality,
            "license_number": request.license_number,
            "experience_years": request.experience_years,
            "biography": request.biography,
            "consultation_fee": request.consultation_fee,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctors",
                Some(auth_token),
                Some(doctor_data),
                Some(representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::Database("Failed to create doctor".to_string()))?;

        parse_doctor(row)
    }

    pub async fn get_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<Doctor> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn get_doctor_by_user(&self, user_id: &str, auth_token: &str) -> Result<Doctor> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn list_doctors(
        &self,
        query: DoctorListQuery,
        auth_token: &str,
    ) -> Result<Vec<Doctor>> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0);

        let mut path = format!(
            "/rest/v1/doctors?order=created_at.desc&limit={}&offset={}",
            limit, offset
        );
        if let Some(speciality) = query.speciality {
            path.push_str(&format!("&speciality=eq.{}", speciality));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result.into_iter().map(parse_doctor).collect()
    }

    pub async fn update_doctor(
        &self,
        doctor_id: &str,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Updating doctor: {}", doctor_id);

        self.get_doctor(doctor_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        if let Some(speciality) = request.speciality {
            if speciality.trim().is_empty() {
                return Err(DoctorError::Validation(
                    "Speciality must not be empty".to_string(),
                ));
            }
            update_data.insert("speciality".to_string(), json!(speciality));
        }
        if let Some(experience_years) = request.experience_years {
            if experience_years < 0 {
                return Err(DoctorError::Validation(
                    "Experience years cannot be negative".to_string(),
                ));
            }
            update_data.insert("experience_years".to_string(), json!(experience_years));
        }
        if let Some(biography) = request.biography {
            update_data.insert("biography".to_string(), json!(biography));
        }
        if let Some(consultation_fee) = request.consultation_fee {
            if consultation_fee < 0.0 {
                return Err(DoctorError::Validation(
                    "Consultation fee cannot be negative".to_string(),
                ));
            }
            update_data.insert("consultation_fee".to_string(), json!(consultation_fee));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
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
            .ok_or_else(|| DoctorError::NotFound("Doctor".to_string()))?;

        parse_doctor(row)
    }

    pub async fn delete_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<()> {
        debug!("Deleting doctor: {}", doctor_id);

        self.get_doctor(doctor_id, auth_token).await?;

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        Ok(())
    }

    /// A doctor counts as available on a date when at least one bookable
    /// slot remains after subtracting existing appointments.
    pub async fn is_doctor_available(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<bool> {
        self.get_doctor(doctor_id, auth_token).await?;

        let available = self
            .schedules
            .has_open_slot(doctor_id, date, auth_token)
            .await?;
        Ok(available)
    }

    pub async fn completed_appointments_count(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<usize> {
        self.get_doctor(doctor_id, auth_token).await?;

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=eq.{}&select=id",
            doctor_id, COMPLETED_STATUS
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(rows.len())
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<Doctor> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::NotFound("Doctor".to_string()))?;

        parse_doctor(row)
    }

    async fn ensure_no_profile_for_user(&self, user_id: &str, auth_token: &str) -> Result<()> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}&select=id", user_id);
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if !existing.is_empty() {
            return Err(DoctorError::Conflict(
                "A doctor profile already exists for this user".to_string(),
            ));
        }
        Ok(())
    }

    async fn ensure_license_unused(
        &self,
        license_number: &str,
        exclude_id: Option<&str>,
        auth_token: &str,
    ) -> Result<()> {
        let mut path = format!(
            "/rest/v1/doctors?license_number=eq.{}&select=id",
            license_number
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if !existing.is_empty() {
            return Err(DoctorError::Conflict(format!(
                "License number {} is already registered",
                license_number
            )));
        }
        Ok(())
    }
}

fn parse_doctor(row: Value) -> Result<Doctor> {
    serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
}

fn validate_doctor_fields(
    speciality: &str,
    experience_years: Option<i32>,
    consultation_fee: Option<f64>,
) -> Result<()> {
    if speciality.trim().is_empty() {
        return Err(DoctorError::Validation(
            "Speciality must not be empty".to_string(),
        ));
    }
    if experience_years.is_some_and(|y| y < 0) {
        return Err(DoctorError::Validation(
            "Experience years cannot be negative".to_string(),
        ));
    }
    if consultation_fee.is_some_and(|f| f < 0.0) {
        return Err(DoctorError::Validation(
            "Consultation fee cannot be negative".to_string(),
        ));
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

#[cfg(test)]
mod tests {
    use super::validate_doctor_fields;

    #[test]
    fn accepts_well_formed_fields() {
        assert!(validate_doctor_fields("Cardiology", Some(8), Some(120.0)).is_ok());
        assert!(validate_doctor_fields("Dermatology", None, None).is_ok());
    }

    #[test]
    fn rejects_blank_speciality() {
        assert!(validate_doctor_fields("  ", None, None).is_err());
    }

    #[test]
    fn rejects_negative_numbers() {
        assert!(validate_doctor_fields("Cardiology", Some(-1), None).is_err());
        assert!(validate_doctor_fields("Cardiology", None, Some(-5.0)).is_err());
    }
}
