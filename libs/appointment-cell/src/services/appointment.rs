use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use schedule_cell::services::ScheduleService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::AppointmentError;
use crate::models::{
    Appointment, AppointmentListQuery, AppointmentStatus, CreateAppointmentRequest,
    RescheduleRequest,
};

type Result<T> = std::result::Result<T, AppointmentError>;

const DEFAULT_PAGE_SIZE: i32 = 20;

/// Statuses that keep a slot occupied, as a PostgREST `in.(...)` filter.
const OCCUPYING_STATUSES: &str = "scheduled,confirmed,in_progress";

pub struct AppointmentService {
    supabase: SupabaseClient,
    schedules: ScheduleService,
    slot_duration: Duration,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            schedules: ScheduleService::new(config),
            slot_duration: Duration::minutes(config.slot_duration_minutes),
        }
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment> {
        debug!(
            "Booking appointment for patient {} with doctor {} at {}",
            request.patient_id, request.doctor_id, request.appointment_datetime
        );

        if request.appointment_datetime <= Utc::now() {
            return Err(AppointmentError::PastDateTime);
        }

        self.ensure_exists("patients", "Patient", &request.patient_id.to_string(), auth_token)
            .await?;
        self.ensure_exists("doctors", "Doctor", &request.doctor_id.to_string(), auth_token)
            .await?;

        self.ensure_slot_bookable(
            &request.doctor_id.to_string(),
            request.appointment_datetime,
            auth_token,
        )
        .await?;

        let appointment_data = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "appointment_datetime": request.appointment_datetime.to_rfc3339(),
            "appointment_type": request.appointment_type,
            "status": AppointmentStatus::Scheduled.as_str(),
            "notes": request.notes,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Failed to create appointment".to_string()))?;

        let appointment = parse_appointment(row)?;
        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<Appointment> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))?;

        parse_appointment(row)
    }

    pub async fn get_doctor_appointments(
        &self,
        doctor_id: &str,
        query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let filter = format!("doctor_id=eq.{}", doctor_id);
        self.list_appointments(Some(&filter), query, auth_token).await
    }

    pub async fn get_patient_appointments(
        &self,
        patient_id: &str,
        query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let filter = format!("patient_id=eq.{}", patient_id);
        self.list_appointments(Some(&filter), query, auth_token).await
    }

    /// Clinic-wide listing by status, across all doctors and patients.
    pub async fn get_appointments_by_status(
        &self,
        status: AppointmentStatus,
        mut query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        query.status = Some(status);
        self.list_appointments(None, query, auth_token).await
    }

    /// Clinic-wide listing for a calendar date, across all doctors and
    /// patients.
    pub async fn get_appointments_by_date(
        &self,
        date: NaiveDate,
        mut query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        query.date = Some(date);
        self.list_appointments(None, query, auth_token).await
    }

    pub async fn update_status(
        &self,
        appointment_id: &str,
        next: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !appointment.status.can_transition_to(next) {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                to: next,
            });
        }

        self.patch_appointment(
            appointment_id,
            json!({
                "status": next.as_str(),
                "updated_at": Utc::now().to_rfc3339()
            }),
            auth_token,
        )
        .await
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: &str,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !appointment
            .status
            .can_transition_to(AppointmentStatus::Cancelled)
        {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                to: AppointmentStatus::Cancelled,
            });
        }

        info!("Cancelling appointment {}", appointment_id);
        self.patch_appointment(
            appointment_id,
            json!({
                "status": AppointmentStatus::Cancelled.as_str(),
                "cancel_reason": reason,
                "updated_at": Utc::now().to_rfc3339()
            }),
            auth_token,
        )
        .await
    }

    pub async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        request: RescheduleRequest,
        auth_token: &str,
    ) -> Result<Appointment> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if appointment.status.is_terminal() {
            return Err(AppointmentError::Validation(format!(
                "Cannot reschedule a {} appointment",
                appointment.status.as_str()
            )));
        }
        if request.appointment_datetime <= Utc::now() {
            return Err(AppointmentError::PastDateTime);
        }

        self.ensure_slot_bookable(
            &appointment.doctor_id.to_string(),
            request.appointment_datetime,
            auth_token,
        )
        .await?;

        self.patch_appointment(
            appointment_id,
            json!({
                "appointment_datetime": request.appointment_datetime.to_rfc3339(),
                "updated_at": Utc::now().to_rfc3339()
            }),
            auth_token,
        )
        .await
    }

    pub async fn delete_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<()> {
        self.get_appointment(appointment_id, auth_token).await?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        Ok(())
    }

    /// True when an occupying appointment for the doctor overlaps the
    /// candidate slot `[datetime, datetime + slot_duration)`.
    pub async fn has_conflicts(
        &self,
        doctor_id: &str,
        datetime: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<bool> {
        let window_start = datetime - self.slot_duration;
        let window_end = datetime + self.slot_duration;

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=in.({})&appointment_datetime=gt.{}&appointment_datetime=lt.{}&select=id",
            doctor_id,
            OCCUPYING_STATUSES,
            window_start.to_rfc3339(),
            window_end.to_rfc3339()
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(!rows.is_empty())
    }

    async fn ensure_slot_bookable(
        &self,
        doctor_id: &str,
        datetime: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<()> {
        let date: NaiveDate = datetime.date_naive();
        let start = datetime.time();
        let end = start + self.slot_duration;
        let day_of_week = date.weekday().number_from_monday();

        let free = self
            .schedules
            .is_slot_free(doctor_id, day_of_week, start, end, Some(date), auth_token)
            .await?;
        if !free {
            return Err(AppointmentError::Conflict(
                "Requested slot is not available".to_string(),
            ));
        }
        Ok(())
    }

    async fn list_appointments(
        &self,
        filter: Option<&str>,
        query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0);

        let mut path = format!(
            "/rest/v1/appointments?order=appointment_datetime.asc&limit={}&offset={}",
            limit, offset
        );
        if let Some(filter) = filter {
            path.push_str(&format!("&{}", filter));
        }
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status.as_str()));
        }
        if let Some(date) = query.date {
            let day_start = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
            let day_end = day_start + Duration::days(1);
            path.push_str(&format!(
                "&appointment_datetime=gte.{}&appointment_datetime=lt.{}",
                day_start.and_utc().to_rfc3339(),
                day_end.and_utc().to_rfc3339()
            ));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        result.into_iter().map(parse_appointment).collect()
    }

    async fn patch_appointment(
        &self,
        appointment_id: &str,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                Some(representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))?;

        parse_appointment(row)
    }

    /// Resolves the user account owning a patient record, for handler-level
    /// ownership checks.
    pub async fn patient_user_id(&self, patient_id: &str, auth_token: &str) -> Result<String> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id,user_id", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::NotFound("Patient".to_string()))?;

        row["user_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppointmentError::Database("Patient row missing user_id".to_string()))
    }

    async fn ensure_exists(
        &self,
        table: &str,
        what: &str,
        id: &str,
        auth_token: &str,
    ) -> Result<()> {
        let path = format!("/rest/v1/{}?id=eq.{}&select=id", table, id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if rows.is_empty() {
            return Err(AppointmentError::NotFound(what.to_string()));
        }
        Ok(())
    }
}

fn parse_appointment(row: Value) -> Result<Appointment> {
    serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
}

fn representation_headers() -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "Prefer",
        reqwest::header::HeaderValue::from_static("return=representation"),
    );
    headers
}
