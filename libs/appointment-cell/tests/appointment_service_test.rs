use assert_matches::assert_matches;
use chrono::{Datelike, Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentListQuery, AppointmentStatus, AppointmentType, CreateAppointmentRequest,
    RescheduleRequest,
};
use appointment_cell::services::AppointmentService;
use appointment_cell::AppointmentError;
use shared_utils::test_utils::TestConfig;

const TOKEN: &str = "test-token";

fn service_for(mock_server: &MockServer) -> AppointmentService {
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    AppointmentService::new(&config)
}

fn appointment_row(
    id: &str,
    patient_id: &str,
    doctor_id: &str,
    datetime: &str,
    status: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "patient_id": patient_id,
        "doctor_id": doctor_id,
        "appointment_datetime": datetime,
        "appointment_type": "consultation",
        "status": status,
        "notes": null,
        "cancel_reason": null,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

/// A future datetime at 09:30 on the next occurrence of the schedule's day.
fn next_week_at_0930() -> chrono::DateTime<Utc> {
    let base = Utc::now().date_naive() + Duration::days(7);
    base.and_hms_opt(9, 30, 0).unwrap().and_utc()
}

fn booking_request(datetime: chrono::DateTime<Utc>) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        appointment_datetime: datetime,
        appointment_type: AppointmentType::Consultation,
        notes: None,
    }
}

async fn mock_parties_exist(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4().to_string() }
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4().to_string() }
        ])))
        .mount(mock_server)
        .await;
}

async fn mock_open_schedule(mock_server: &MockServer, doctor_id: &str, day_of_week: u32) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4().to_string(),
            "doctor_id": doctor_id,
            "day_of_week": day_of_week,
            "start_time": "09:00:00",
            "end_time": "12:00:00",
            "status": "active",
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        }])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn create_appointment_rejects_past_datetime() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    let request = booking_request(Utc::now() - Duration::hours(1));

    let err = service.create_appointment(request, TOKEN).await.unwrap_err();
    assert_matches!(err, AppointmentError::PastDateTime);
}

#[tokio::test]
async fn create_appointment_requires_existing_patient() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = booking_request(next_week_at_0930());

    let err = service.create_appointment(request, TOKEN).await.unwrap_err();
    assert_matches!(err, AppointmentError::NotFound(_));
}

#[tokio::test]
async fn create_appointment_rejects_slot_outside_schedule() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    mock_parties_exist(&mock_server).await;

    // Doctor has no working window that day.
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = booking_request(next_week_at_0930());

    let err = service.create_appointment(request, TOKEN).await.unwrap_err();
    assert_matches!(err, AppointmentError::Conflict(_));
}

#[tokio::test]
async fn create_appointment_books_an_open_slot() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let datetime = next_week_at_0930();
    let day_of_week = datetime.date_naive().weekday().number_from_monday();
    let request = booking_request(datetime);
    let doctor_id = request.doctor_id.to_string();
    let patient_id = request.patient_id.to_string();

    mock_parties_exist(&mock_server).await;
    mock_open_schedule(&mock_server, &doctor_id, day_of_week).await;

    // No competing bookings that day.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            appointment_row(
                &Uuid::new_v4().to_string(),
                &patient_id,
                &doctor_id,
                &datetime.to_rfc3339(),
                "scheduled"
            )
        ])))
        .mount(&mock_server)
        .await;

    let appointment = service
        .create_appointment(request, TOKEN)
        .await
        .expect("booking should succeed");

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn create_appointment_detects_competing_booking() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let datetime = next_week_at_0930();
    let day_of_week = datetime.date_naive().weekday().number_from_monday();
    let request = booking_request(datetime);
    let doctor_id = request.doctor_id.to_string();

    mock_parties_exist(&mock_server).await;
    mock_open_schedule(&mock_server, &doctor_id, day_of_week).await;

    // The exact slot is already held by another patient.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_datetime": datetime.to_rfc3339() }
        ])))
        .mount(&mock_server)
        .await;

    let err = service.create_appointment(request, TOKEN).await.unwrap_err();
    assert_matches!(err, AppointmentError::Conflict(_));
}

#[tokio::test]
async fn get_appointment_maps_empty_result_to_not_found() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let err = service
        .get_appointment(&Uuid::new_v4().to_string(), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::NotFound(_));
}

#[tokio::test]
async fn update_status_allows_valid_transition() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let appointment_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let datetime = next_week_at_0930().to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(&appointment_id, &patient_id, &doctor_id, &datetime, "scheduled")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(&appointment_id, &patient_id, &doctor_id, &datetime, "confirmed")
        ])))
        .mount(&mock_server)
        .await;

    let appointment = service
        .update_status(&appointment_id, AppointmentStatus::Confirmed, TOKEN)
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn update_status_rejects_invalid_transition() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let appointment_id = Uuid::new_v4().to_string();
    let datetime = next_week_at_0930().to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(
                &appointment_id,
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &datetime,
                "completed"
            )
        ])))
        .mount(&mock_server)
        .await;

    let err = service
        .update_status(&appointment_id, AppointmentStatus::Confirmed, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::InvalidStatusTransition { .. });
}

#[tokio::test]
async fn cancel_records_the_reason() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let appointment_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let datetime = next_week_at_0930().to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(&appointment_id, &patient_id, &doctor_id, &datetime, "scheduled")
        ])))
        .mount(&mock_server)
        .await;

    let mut cancelled =
        appointment_row(&appointment_id, &patient_id, &doctor_id, &datetime, "cancelled");
    cancelled["cancel_reason"] = json!("Patient unwell");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&mock_server)
        .await;

    let appointment = service
        .cancel_appointment(&appointment_id, Some("Patient unwell".to_string()), TOKEN)
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(appointment.cancel_reason.as_deref(), Some("Patient unwell"));
}

#[tokio::test]
async fn reschedule_rejects_terminal_appointment() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let appointment_id = Uuid::new_v4().to_string();
    let datetime = next_week_at_0930();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(
                &appointment_id,
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &datetime.to_rfc3339(),
                "cancelled"
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = RescheduleRequest {
        appointment_datetime: datetime + Duration::days(1),
    };

    let err = service
        .reschedule_appointment(&appointment_id, request, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::Validation(_));
}

#[tokio::test]
async fn doctor_listing_applies_status_filter() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();
    let datetime = next_week_at_0930().to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.confirmed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &doctor_id,
                &datetime,
                "confirmed"
            )
        ])))
        .mount(&mock_server)
        .await;

    let query = AppointmentListQuery {
        status: Some(AppointmentStatus::Confirmed),
        date: None,
        limit: None,
        offset: None,
    };
    let appointments = service
        .get_doctor_appointments(&doctor_id, query, TOKEN)
        .await
        .unwrap();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn clinic_wide_status_listing_spans_all_doctors() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let datetime = next_week_at_0930().to_rfc3339();

    // Two different doctors; no doctor_id filter is sent.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &datetime,
                "completed"
            ),
            appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &datetime,
                "completed"
            )
        ])))
        .mount(&mock_server)
        .await;

    let query = AppointmentListQuery {
        status: None,
        date: None,
        limit: None,
        offset: None,
    };
    let appointments = service
        .get_appointments_by_status(AppointmentStatus::Completed, query, TOKEN)
        .await
        .unwrap();
    assert_eq!(appointments.len(), 2);
    assert!(appointments
        .iter()
        .all(|a| a.status == AppointmentStatus::Completed));
}

#[tokio::test]
async fn clinic_wide_date_listing_returns_that_days_bookings() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let datetime = next_week_at_0930();
    let date = datetime.date_naive();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &datetime.to_rfc3339(),
                "scheduled"
            )
        ])))
        .mount(&mock_server)
        .await;

    let query = AppointmentListQuery {
        status: None,
        date: None,
        limit: None,
        offset: None,
    };
    let appointments = service
        .get_appointments_by_date(date, query, TOKEN)
        .await
        .unwrap();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].appointment_datetime.date_naive(), date);
}

#[tokio::test]
async fn has_conflicts_reports_occupying_neighbours() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();
    let datetime = next_week_at_0930();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4().to_string() }
        ])))
        .mount(&mock_server)
        .await;

    let conflicted = service
        .has_conflicts(&doctor_id, datetime, TOKEN)
        .await
        .unwrap();
    assert!(conflicted);
}
