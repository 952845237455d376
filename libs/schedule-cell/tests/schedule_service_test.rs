use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::models::{CreateScheduleRequest, ScheduleStatus, WeeklyScheduleEntry};
use schedule_cell::services::ScheduleService;
use schedule_cell::ScheduleError;
use shared_utils::test_utils::TestConfig;

const TOKEN: &str = "test-token";

fn service_for(mock_server: &MockServer) -> ScheduleService {
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    ScheduleService::new(&config)
}

fn time(value: &str) -> NaiveTime {
    NaiveTime::parse_from_str(value, "%H:%M").unwrap()
}

fn schedule_row(id: &str, doctor_id: &str, day: u32, start: &str, end: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "doctor_id": doctor_id,
        "day_of_week": day,
        "start_time": format!("{}:00", start),
        "end_time": format!("{}:00", end),
        "status": status,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

async fn mock_doctor_exists(mock_server: &MockServer, doctor_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": doctor_id, "user_id": Uuid::new_v4().to_string() }
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn create_schedule_rejects_inverted_range() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    let request = CreateScheduleRequest {
        day_of_week: 1,
        start_time: time("12:00"),
        end_time: time("09:00"),
        status: None,
    };

    let err = service
        .create_schedule(&doctor_id, request, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::InvalidRange);
}

#[tokio::test]
async fn create_schedule_rejects_bad_day_of_week() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    let request = CreateScheduleRequest {
        day_of_week: 8,
        start_time: time("09:00"),
        end_time: time("12:00"),
        status: None,
    };

    let err = service
        .create_schedule(&doctor_id, request, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::InvalidDayOfWeek(8));
}

#[tokio::test]
async fn create_schedule_detects_overlap_with_existing_entry() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    mock_doctor_exists(&mock_server, &doctor_id).await;

    // Existing active entry Monday 09:00-12:00.
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            schedule_row(&Uuid::new_v4().to_string(), &doctor_id, 1, "09:00", "12:00", "active")
        ])))
        .mount(&mock_server)
        .await;

    let request = CreateScheduleRequest {
        day_of_week: 1,
        start_time: time("11:00"),
        end_time: time("13:00"),
        status: None,
    };

    let err = service
        .create_schedule(&doctor_id, request, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::Conflict(_));
}

#[tokio::test]
async fn create_schedule_inserts_when_no_conflict() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();
    let schedule_id = Uuid::new_v4().to_string();

    mock_doctor_exists(&mock_server, &doctor_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            schedule_row(&schedule_id, &doctor_id, 1, "09:00", "12:00", "active")
        ])))
        .mount(&mock_server)
        .await;

    let request = CreateScheduleRequest {
        day_of_week: 1,
        start_time: time("09:00"),
        end_time: time("12:00"),
        status: None,
    };

    let schedule = service
        .create_schedule(&doctor_id, request, TOKEN)
        .await
        .expect("schedule should be created");

    assert_eq!(schedule.day_of_week, 1);
    assert_eq!(schedule.status, ScheduleStatus::Active);
    assert_eq!(schedule.start_time, time("09:00"));
}

#[tokio::test]
async fn get_schedule_maps_empty_result_to_not_found() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let err = service
        .get_schedule_by_id(&Uuid::new_v4().to_string(), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::NotFound(_));
}

#[tokio::test]
async fn available_slots_subtract_booked_appointments() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    // 2025-06-02 is a Monday.
    let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .and(query_param("day_of_week", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            schedule_row(&Uuid::new_v4().to_string(), &doctor_id, 1, "09:00", "11:00", "active")
        ])))
        .mount(&mock_server)
        .await;

    // One confirmed appointment at 09:30.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_datetime": "2025-06-02T09:30:00Z" }
        ])))
        .mount(&mock_server)
        .await;

    let slots = service
        .list_available_slots(&doctor_id, date, TOKEN)
        .await
        .expect("slots should be computed");

    assert_eq!(slots, vec![time("09:00"), time("10:00"), time("10:30")]);
}

#[tokio::test]
async fn day_without_schedule_yields_empty_slot_list() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let date = NaiveDate::from_ymd_opt(2025, 6, 8).unwrap();
    let slots = service
        .list_available_slots(&doctor_id, date, TOKEN)
        .await
        .expect("a day off is not an error");

    assert!(slots.is_empty());
}

#[tokio::test]
async fn weekly_create_rejects_internally_overlapping_set() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    mock_doctor_exists(&mock_server, &doctor_id).await;

    let entries = vec![
        WeeklyScheduleEntry {
            day_of_week: 1,
            start_time: time("09:00"),
            end_time: time("12:00"),
            status: None,
        },
        WeeklyScheduleEntry {
            day_of_week: 1,
            start_time: time("11:00"),
            end_time: time("13:00"),
            status: None,
        },
    ];

    let err = service
        .create_weekly_schedule(&doctor_id, entries, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::Conflict(_));
}

#[tokio::test]
async fn weekly_replace_round_trips_the_submitted_set() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    mock_doctor_exists(&mock_server, &doctor_id).await;

    let replaced = json!([
        schedule_row(&Uuid::new_v4().to_string(), &doctor_id, 1, "09:00", "12:00", "active"),
        schedule_row(&Uuid::new_v4().to_string(), &doctor_id, 2, "14:00", "17:00", "active"),
    ]);

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/replace_weekly_schedule"))
        .respond_with(ResponseTemplate::new(200).set_body_json(replaced))
        .mount(&mock_server)
        .await;

    let entries = vec![
        WeeklyScheduleEntry {
            day_of_week: 1,
            start_time: time("09:00"),
            end_time: time("12:00"),
            status: None,
        },
        WeeklyScheduleEntry {
            day_of_week: 2,
            start_time: time("14:00"),
            end_time: time("17:00"),
            status: None,
        },
    ];

    let schedules = service
        .update_weekly_schedule(&doctor_id, entries.clone(), TOKEN)
        .await
        .expect("replace should succeed");

    assert_eq!(schedules.len(), entries.len());
    let mut returned: Vec<(u32, NaiveTime, NaiveTime)> = schedules
        .iter()
        .map(|s| (s.day_of_week, s.start_time, s.end_time))
        .collect();
    let mut submitted: Vec<(u32, NaiveTime, NaiveTime)> = entries
        .iter()
        .map(|e| (e.day_of_week, e.start_time, e.end_time))
        .collect();
    returned.sort();
    submitted.sort();
    assert_eq!(returned, submitted);
}

#[tokio::test]
async fn weekly_replace_rejects_empty_set() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    mock_doctor_exists(&mock_server, &doctor_id).await;

    let err = service
        .update_weekly_schedule(&doctor_id, vec![], TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::Validation(_));
}

#[tokio::test]
async fn is_slot_free_requires_containing_active_entry() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            schedule_row(&Uuid::new_v4().to_string(), &doctor_id, 1, "09:00", "12:00", "active")
        ])))
        .mount(&mock_server)
        .await;

    let free = service
        .is_slot_free(&doctor_id, 1, time("09:00"), time("09:30"), None, TOKEN)
        .await
        .unwrap();
    assert!(free);

    // Runs past the window's end.
    let free = service
        .is_slot_free(&doctor_id, 1, time("11:45"), time("12:15"), None, TOKEN)
        .await
        .unwrap();
    assert!(!free);
}

#[tokio::test]
async fn is_slot_free_checks_bookings_when_date_given() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            schedule_row(&Uuid::new_v4().to_string(), &doctor_id, 1, "09:00", "12:00", "active")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_datetime": "2025-06-02T09:30:00Z" }
        ])))
        .mount(&mock_server)
        .await;

    let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    let free = service
        .is_slot_free(&doctor_id, 1, time("09:30"), time("10:00"), Some(date), TOKEN)
        .await
        .unwrap();
    assert!(!free);

    let free = service
        .is_slot_free(&doctor_id, 1, time("10:00"), time("10:30"), Some(date), TOKEN)
        .await
        .unwrap();
    assert!(free);
}
