use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ScheduleError;
use crate::models::{
    BookedInterval, CreateScheduleRequest, OccupyingAppointment, Schedule, ScheduleStatus,
    UpdateScheduleRequest, WeeklyScheduleEntry,
};
use crate::services::slots;

type Result<T> = std::result::Result<T, ScheduleError>;

/// Appointment statuses that consume a slot.
const OCCUPYING_STATUSES: &str = "scheduled,confirmed,in_progress";

pub struct ScheduleService {
    supabase: SupabaseClient,
    slot_duration: Duration,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            slot_duration: Duration::minutes(config.slot_duration_minutes),
        }
    }

    pub fn slot_duration(&self) -> Duration {
        self.slot_duration
    }

    /// Create a single weekly schedule entry for a doctor.
    pub async fn create_schedule(
        &self,
        doctor_id: &str,
        request: CreateScheduleRequest,
        auth_token: &str,
    ) -> Result<Schedule> {
        debug!("Creating schedule for doctor: {}", doctor_id);

        validate_window(request.day_of_week, request.start_time, request.end_time)?;
        self.ensure_doctor_exists(doctor_id, auth_token).await?;

        let status = request.status.unwrap_or(ScheduleStatus::Active);
        if status == ScheduleStatus::Active {
            self.check_schedule_conflicts(
                doctor_id,
                request.day_of_week,
                request.start_time,
                request.end_time,
                None,
                auth_token,
            )
            .await?;
        }

        let schedule_data = json!({
            "doctor_id": doctor_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "status": status.as_str(),
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/schedules",
                Some(auth_token),
                Some(schedule_data),
                Some(representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::Database("Failed to create schedule".to_string()))?;

        let schedule: Schedule =
            serde_json::from_value(row).map_err(|e| ScheduleError::Database(e.to_string()))?;
        debug!("Schedule created with ID: {}", schedule.id);

        Ok(schedule)
    }

    /// Update an existing entry. The merged window is re-validated and
    /// re-checked for conflicts before anything is written.
    pub async fn update_schedule(
        &self,
        schedule_id: &str,
        request: UpdateScheduleRequest,
        auth_token: &str,
    ) -> Result<Schedule> {
        debug!("Updating schedule: {}", schedule_id);

        let existing = self.get_schedule_by_id(schedule_id, auth_token).await?;

        let day_of_week = request.day_of_week.unwrap_or(existing.day_of_week);
        let start_time = request.start_time.unwrap_or(existing.start_time);
        let end_time = request.end_time.unwrap_or(existing.end_time);
        let status = request.status.unwrap_or(existing.status);

        validate_window(day_of_week, start_time, end_time)?;

        if status == ScheduleStatus::Active {
            self.check_schedule_conflicts(
                &existing.doctor_id.to_string(),
                day_of_week,
                start_time,
                end_time,
                Some(schedule_id),
                auth_token,
            )
            .await?;
        }

        let update_data = json!({
            "day_of_week": day_of_week,
            "start_time": start_time.format("%H:%M:%S").to_string(),
            "end_time": end_time.format("%H:%M:%S").to_string(),
            "status": status.as_str(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/schedules?id=eq.{}", schedule_id);
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
            .ok_or_else(|| ScheduleError::NotFound("Schedule".to_string()))?;

        serde_json::from_value(row).map_err(|e| ScheduleError::Database(e.to_string()))
    }

    pub async fn get_schedule_by_id(
        &self,
        schedule_id: &str,
        auth_token: &str,
    ) -> Result<Schedule> {
        let path = format!("/rest/v1/schedules?id=eq.{}", schedule_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::NotFound("Schedule".to_string()))?;

        serde_json::from_value(row).map_err(|e| ScheduleError::Database(e.to_string()))
    }

    pub async fn get_doctor_schedules(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Schedule>> {
        let path = format!(
            "/rest/v1/schedules?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        self.fetch_schedules(&path, auth_token).await
    }

    pub async fn get_doctor_schedules_by_status(
        &self,
        doctor_id: &str,
        status: ScheduleStatus,
        auth_token: &str,
    ) -> Result<Vec<Schedule>> {
        let path = format!(
            "/rest/v1/schedules?doctor_id=eq.{}&status=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id,
            status.as_str()
        );
        self.fetch_schedules(&path, auth_token).await
    }

    pub async fn get_doctor_schedules_by_day(
        &self,
        doctor_id: &str,
        day_of_week: u32,
        auth_token: &str,
    ) -> Result<Vec<Schedule>> {
        validate_day_of_week(day_of_week)?;
        let path = format!(
            "/rest/v1/schedules?doctor_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            doctor_id, day_of_week
        );
        self.fetch_schedules(&path, auth_token).await
    }

    pub async fn delete_schedule(&self, schedule_id: &str, auth_token: &str) -> Result<()> {
        debug!("Deleting schedule: {}", schedule_id);

        // Confirm existence so a missing id surfaces as 404, not a no-op.
        self.get_schedule_by_id(schedule_id, auth_token).await?;

        let path = format!("/rest/v1/schedules?id=eq.{}", schedule_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await?;

        Ok(())
    }

    /// Flip an entry between active and inactive. Inactive entries are kept
    /// but excluded from slot computation; reactivation re-checks conflicts.
    pub async fn update_schedule_status(
        &self,
        schedule_id: &str,
        status: ScheduleStatus,
        auth_token: &str,
    ) -> Result<Schedule> {
        debug!("Setting schedule {} status to {}", schedule_id, status.as_str());

        let existing = self.get_schedule_by_id(schedule_id, auth_token).await?;

        if status == ScheduleStatus::Active && existing.status != ScheduleStatus::Active {
            self.check_schedule_conflicts(
                &existing.doctor_id.to_string(),
                existing.day_of_week,
                existing.start_time,
                existing.end_time,
                Some(schedule_id),
                auth_token,
            )
            .await?;
        }

        let update_data = json!({
            "status": status.as_str(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/schedules?id=eq.{}", schedule_id);
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
            .ok_or_else(|| ScheduleError::NotFound("Schedule".to_string()))?;

        serde_json::from_value(row).map_err(|e| ScheduleError::Database(e.to_string()))
    }

    /// Insert a full weekly set in one bulk statement. The set is validated
    /// as a whole: each window, plus overlap both within the submission and
    /// against existing active entries.
    pub async fn create_weekly_schedule(
        &self,
        doctor_id: &str,
        entries: Vec<WeeklyScheduleEntry>,
        auth_token: &str,
    ) -> Result<Vec<Schedule>> {
        debug!(
            "Creating weekly schedule for doctor {} ({} entries)",
            doctor_id,
            entries.len()
        );

        self.ensure_doctor_exists(doctor_id, auth_token).await?;
        self.validate_weekly_set(&entries)?;

        for entry in active_entries(&entries) {
            self.check_schedule_conflicts(
                doctor_id,
                entry.day_of_week,
                entry.start_time,
                entry.end_time,
                None,
                auth_token,
            )
            .await?;
        }

        let now = Utc::now().to_rfc3339();
        let rows: Vec<Value> = entries.iter().map(|e| weekly_entry_row(doctor_id, e, &now)).collect();

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/schedules",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some(representation_headers()),
            )
            .await?;

        parse_schedules(result)
    }

    /// Full replace of a doctor's weekly schedule. Runs as one Postgres
    /// function call so a concurrent reader never observes the doctor with a
    /// partially-deleted schedule.
    pub async fn update_weekly_schedule(
        &self,
        doctor_id: &str,
        entries: Vec<WeeklyScheduleEntry>,
        auth_token: &str,
    ) -> Result<Vec<Schedule>> {
        debug!(
            "Replacing weekly schedule for doctor {} ({} entries)",
            doctor_id,
            entries.len()
        );

        self.ensure_doctor_exists(doctor_id, auth_token).await?;
        self.validate_weekly_set(&entries)?;

        let now = Utc::now().to_rfc3339();
        let rows: Vec<Value> = entries.iter().map(|e| weekly_entry_row(doctor_id, e, &now)).collect();

        let args = json!({
            "p_doctor_id": doctor_id,
            "p_entries": rows
        });

        let result: Vec<Value> = self
            .supabase
            .rpc("replace_weekly_schedule", args, Some(auth_token))
            .await?;

        parse_schedules(result)
    }

    /// Point query: can the candidate interval be booked on the given day?
    /// With a date in scope, occupying appointments on that date are also
    /// checked; without one, only the weekly schedule is consulted.
    pub async fn is_slot_free(
        &self,
        doctor_id: &str,
        day_of_week: u32,
        start_time: NaiveTime,
        end_time: NaiveTime,
        date: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<bool> {
        validate_window(day_of_week, start_time, end_time)?;

        let entries = self
            .get_active_schedules_for_day(doctor_id, day_of_week, auth_token)
            .await?;

        let booked = match date {
            Some(date) => self.get_booked_intervals(doctor_id, date, auth_token).await?,
            None => Vec::new(),
        };

        Ok(slots::is_slot_free(&entries, &booked, start_time, end_time))
    }

    /// Open slot starts for a doctor on a calendar date. A day without
    /// active entries is a valid, empty result.
    pub async fn list_available_slots(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<NaiveTime>> {
        let day_of_week = date.weekday().number_from_monday();
        debug!(
            "Calculating available slots for doctor {} on {} (day {})",
            doctor_id, date, day_of_week
        );

        let entries = self
            .get_active_schedules_for_day(doctor_id, day_of_week, auth_token)
            .await?;

        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let booked = self.get_booked_intervals(doctor_id, date, auth_token).await?;

        let available = slots::compute_available_slots(&entries, &booked, self.slot_duration);
        debug!("Found {} available slots", available.len());

        Ok(available)
    }

    /// True when the doctor has at least one open slot on the date.
    pub async fn has_open_slot(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<bool> {
        let available = self.list_available_slots(doctor_id, date, auth_token).await?;
        Ok(!available.is_empty())
    }

    /// Resolves the user account owning a doctor profile, for handler-level
    /// ownership checks.
    pub async fn doctor_user_id(&self, doctor_id: &str, auth_token: &str) -> Result<String> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id,user_id", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::NotFound("Doctor".to_string()))?;

        row["user_id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ScheduleError::Database("Doctor row missing user_id".to_string()))
    }

    // Private helpers

    async fn fetch_schedules(&self, path: &str, auth_token: &str) -> Result<Vec<Schedule>> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await?;
        parse_schedules(result)
    }

    async fn get_active_schedules_for_day(
        &self,
        doctor_id: &str,
        day_of_week: u32,
        auth_token: &str,
    ) -> Result<Vec<Schedule>> {
        let path = format!(
            "/rest/v1/schedules?doctor_id=eq.{}&day_of_week=eq.{}&status=eq.active&order=start_time.asc",
            doctor_id, day_of_week
        );
        self.fetch_schedules(&path, auth_token).await
    }

    async fn get_booked_intervals(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>> {
        let start_of_day = date.and_hms_opt(0, 0, 0).expect("valid midnight").and_utc();
        let end_of_day = date.and_hms_opt(23, 59, 59).expect("valid time").and_utc();

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_datetime=gte.{}&appointment_datetime=lte.{}&status=in.({})&select=appointment_datetime",
            doctor_id,
            start_of_day.to_rfc3339(),
            end_of_day.to_rfc3339(),
            OCCUPYING_STATUSES
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let appointments: Vec<OccupyingAppointment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        Ok(appointments
            .into_iter()
            .map(|apt| {
                let start = apt.appointment_datetime.time();
                BookedInterval {
                    start_time: start,
                    end_time: start + self.slot_duration,
                }
            })
            .collect())
    }

    async fn ensure_doctor_exists(&self, doctor_id: &str, auth_token: &str) -> Result<()> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        if result.is_empty() {
            return Err(ScheduleError::NotFound("Doctor".to_string()));
        }
        Ok(())
    }

    async fn check_schedule_conflicts(
        &self,
        doctor_id: &str,
        day_of_week: u32,
        start_time: NaiveTime,
        end_time: NaiveTime,
        exclude_id: Option<&str>,
        auth_token: &str,
    ) -> Result<()> {
        let mut path = format!(
            "/rest/v1/schedules?doctor_id=eq.{}&day_of_week=eq.{}&status=eq.active",
            doctor_id, day_of_week
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing = self.fetch_schedules(&path, auth_token).await?;

        for schedule in existing {
            if schedule.overlaps(start_time, end_time) {
                return Err(ScheduleError::Conflict(format!(
                    "overlaps active entry {} - {} on day {}",
                    schedule.start_time, schedule.end_time, day_of_week
                )));
            }
        }

        Ok(())
    }

    fn validate_weekly_set(&self, entries: &[WeeklyScheduleEntry]) -> Result<()> {
        if entries.is_empty() {
            return Err(ScheduleError::Validation(
                "Weekly schedule must contain at least one entry".to_string(),
            ));
        }

        for entry in entries {
            validate_window(entry.day_of_week, entry.start_time, entry.end_time)?;
        }

        let active: Vec<(u32, NaiveTime, NaiveTime)> = active_entries(entries)
            .map(|e| (e.day_of_week, e.start_time, e.end_time))
            .collect();

        if let Some(day) = slots::find_internal_overlap(&active) {
            return Err(ScheduleError::Conflict(format!(
                "submitted entries overlap on day {}",
                day
            )));
        }

        Ok(())
    }
}

fn active_entries(
    entries: &[WeeklyScheduleEntry],
) -> impl Iterator<Item = &WeeklyScheduleEntry> {
    entries
        .iter()
        .filter(|e| e.status.unwrap_or(ScheduleStatus::Active) == ScheduleStatus::Active)
}

fn weekly_entry_row(doctor_id: &str, entry: &WeeklyScheduleEntry, now: &str) -> Value {
    json!({
        "doctor_id": doctor_id,
        "day_of_week": entry.day_of_week,
        "start_time": entry.start_time.format("%H:%M:%S").to_string(),
        "end_time": entry.end_time.format("%H:%M:%S").to_string(),
        "status": entry.status.unwrap_or(ScheduleStatus::Active).as_str(),
        "created_at": now,
        "updated_at": now
    })
}

fn parse_schedules(rows: Vec<Value>) -> Result<Vec<Schedule>> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<Vec<Schedule>, _>>()
        .map_err(|e| ScheduleError::Database(e.to_string()))
}

fn validate_window(day_of_week: u32, start_time: NaiveTime, end_time: NaiveTime) -> std::result::Result<(), ScheduleError> {
    validate_day_of_week(day_of_week)?;
    if start_time >= end_time {
        return Err(ScheduleError::InvalidRange);
    }
    Ok(())
}

fn validate_day_of_week(day_of_week: u32) -> std::result::Result<(), ScheduleError> {
    if !(1..=7).contains(&day_of_week) {
        return Err(ScheduleError::InvalidDayOfWeek(day_of_week));
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
