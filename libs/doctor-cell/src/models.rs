use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub speciality: String,
    pub license_number: String,
    pub experience_years: Option<i32>,
    pub biography: Option<String>,
    pub consultation_fee: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub user_id: Uuid,
    pub speciality: String,
    pub license_number: String,
    pub experience_years: Option<i32>,
    pub biography: Option<String>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub speciality: Option<String>,
    pub experience_years: Option<i32>,
    pub biography: Option<String>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorListQuery {
    pub speciality: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}
