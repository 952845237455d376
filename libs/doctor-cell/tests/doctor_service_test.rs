use assert_matches::assert_matches;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{CreateDoctorRequest, DoctorListQuery, UpdateDoctorRequest};
use doctor_cell::services::DoctorService;
use doctor_cell::DoctorError;
use shared_utils::test_utils::TestConfig;

const TOKEN: &str = "test-token";

fn service_for(mock_server: &MockServer) -> DoctorService {
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    DoctorService::new(&config)
}

fn doctor_row(id: &str, user_id: &str, speciality: &str, license: &str) -> serde_json::Value {
    json!({
        "id": id,
        "user_id": user_id,
        "speciality": speciality,
        "license_number": license,
        "experience_years": 5,
        "biography": null,
        "consultation_fee": 80.0,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339()
    })
}

fn create_request(license: &str) -> CreateDoctorRequest {
    CreateDoctorRequest {
        user_id: Uuid::new_v4(),
        speciality: "Cardiology".to_string(),
        license_number: license.to_string(),
        experience_years: Some(5),
        biography: None,
        consultation_fee: Some(80.0),
    }
}

#[tokio::test]
async fn create_doctor_rejects_blank_speciality() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    let mut request = create_request("IMC-1234");
    request.speciality = " ".to_string();

    let err = service.create_doctor(request, TOKEN).await.unwrap_err();
    assert_matches!(err, DoctorError::Validation(_));
}

#[tokio::test]
async fn create_doctor_rejects_duplicate_license() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    // No existing profile for the user.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("license_number", "eq.IMC-1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4().to_string() }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let err = service
        .create_doctor(create_request("IMC-1234"), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, DoctorError::Conflict(_));
}

#[tokio::test]
async fn create_doctor_inserts_when_unique() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();
    let request = create_request("IMC-5678");
    let user_id = request.user_id.to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            doctor_row(&doctor_id, &user_id, "Cardiology", "IMC-5678")
        ])))
        .mount(&mock_server)
        .await;

    let doctor = service
        .create_doctor(request, TOKEN)
        .await
        .expect("doctor should be created");

    assert_eq!(doctor.speciality, "Cardiology");
    assert_eq!(doctor.license_number, "IMC-5678");
}

#[tokio::test]
async fn get_doctor_maps_empty_result_to_not_found() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let err = service
        .get_doctor(&Uuid::new_v4().to_string(), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, DoctorError::NotFound(_));
}

#[tokio::test]
async fn list_doctors_applies_speciality_filter() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("speciality", "eq.Dermatology"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            doctor_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "Dermatology",
                "IMC-9012"
            )
        ])))
        .mount(&mock_server)
        .await;

    let query = DoctorListQuery {
        speciality: Some("Dermatology".to_string()),
        limit: None,
        offset: None,
    };
    let doctors = service.list_doctors(query, TOKEN).await.unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].speciality, "Dermatology");
}

#[tokio::test]
async fn update_doctor_rejects_negative_fee() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            doctor_row(&doctor_id, &Uuid::new_v4().to_string(), "Cardiology", "IMC-1234")
        ])))
        .mount(&mock_server)
        .await;

    let request = UpdateDoctorRequest {
        speciality: None,
        experience_years: None,
        biography: None,
        consultation_fee: Some(-10.0),
    };

    let err = service
        .update_doctor(&doctor_id, request, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, DoctorError::Validation(_));
}

#[tokio::test]
async fn availability_reflects_open_slots() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            doctor_row(&doctor_id, &Uuid::new_v4().to_string(), "Cardiology", "IMC-1234")
        ])))
        .mount(&mock_server)
        .await;

    // Monday window 09:00-10:00, no bookings.
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4().to_string(),
            "doctor_id": doctor_id,
            "day_of_week": 1,
            "start_time": "09:00:00",
            "end_time": "10:00:00",
            "status": "active",
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // 2025-06-02 is a Monday.
    let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    let available = service
        .is_doctor_available(&doctor_id, date, TOKEN)
        .await
        .unwrap();
    assert!(available);
}

#[tokio::test]
async fn availability_is_false_on_a_day_off() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            doctor_row(&doctor_id, &Uuid::new_v4().to_string(), "Cardiology", "IMC-1234")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let date = NaiveDate::from_ymd_opt(2025, 6, 8).unwrap();
    let available = service
        .is_doctor_available(&doctor_id, date, TOKEN)
        .await
        .unwrap();
    assert!(!available);
}

#[tokio::test]
async fn completed_count_reflects_returned_rows() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            doctor_row(&doctor_id, &Uuid::new_v4().to_string(), "Cardiology", "IMC-1234")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4().to_string() },
            { "id": Uuid::new_v4().to_string() },
            { "id": Uuid::new_v4().to_string() }
        ])))
        .mount(&mock_server)
        .await;

    let count = service
        .completed_appointments_count(&doctor_id, TOKEN)
        .await
        .unwrap();
    assert_eq!(count, 3);
}
