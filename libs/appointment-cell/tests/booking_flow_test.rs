use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, AvailableSlotsQuery, BookAppointmentRequest,
    CheckStatusRequest, LifecycleAction, UpdateAppointmentRequest,
};
use appointment_cell::services::{
    AppointmentLifecycleService, AppointmentService, BookingService, SlotService,
};
use shared_config::AppConfig;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn config(server: &MockServer) -> AppConfig {
    TestConfig::with_url(&server.uri()).to_app_config()
}

fn booking(doctor_id: Uuid, time: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        patient_name: Some("Jane Patient".into()),
        patient_email: Some("jane@example.com".into()),
        patient_phone: Some("+15550111".into()),
        doctor_id: Some(doctor_id.to_string()),
        service_id: None,
        appointment_date: Some("2025-06-10".into()),
        appointment_time: Some(time.into()),
        notes: Some("First visit".into()),
    }
}

async fn mount_active_doctor(server: &MockServer, doctor_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .and(query_param("role", "eq.doctor"))
        .and(query_param("is_active", "eq.true"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockSupabaseResponses::doctor_row(doctor_id, "Dr Who", true)])),
        )
        .mount(server)
        .await;
}

async fn mount_slot_count(server: &MockServer, held: u64) {
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", format!("*/{}", held).as_str()))
        .mount(server)
        .await;
}

async fn mount_booked_times(server: &MockServer, times: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "preferred_time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(times))
        .mount(server)
        .await;
}

async fn mount_current(server: &MockServer, row: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

async fn last_patch_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .rev()
        .find(|r| r.method.as_str() == "PATCH")
        .expect("no PATCH was sent");
    serde_json::from_slice(&patch.body).unwrap()
}

#[tokio::test]
async fn booking_scenario_from_free_day_to_completion_guard() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    // free day: all sixteen slots open
    mount_active_doctor(&server, doctor_id).await;
    mount_booked_times(&server, json!([])).await;
    let slots = SlotService::new(&config(&server))
        .available_slots(
            AvailableSlotsQuery {
                doctor_id: Some(doctor_id.to_string()),
                date: Some("2025-06-10".into()),
            },
            today(),
        )
        .await
        .unwrap();
    assert_eq!(slots.slots.len(), 16);
    assert!(slots.slots.iter().all(|s| s.available));
    assert_eq!(slots.date, "2025-06-10");

    // book 10:00
    server.reset().await;
    mount_active_doctor(&server, doctor_id).await;
    mount_slot_count(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(appointment_id, doctor_id, "pending", None)
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let booked = BookingService::new(&config(&server))
        .book(booking(doctor_id, "10:00"), today())
        .await
        .unwrap();
    assert_eq!(booked.status, AppointmentStatus::Pending);
    assert!(booked.confirmed_at.is_none());
    assert_eq!(booked.doctor.as_ref().map(|d| d.id), Some(doctor_id));

    let requests = server.received_requests().await.unwrap();
    let insert = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
    let inserted: Value = serde_json::from_slice(&insert.body).unwrap();
    assert_eq!(inserted["status"], "pending");
    assert_eq!(inserted["preferred_time"], "10:00:00");
    assert_eq!(inserted["message"], "First visit");

    // 10:00 now shows as taken
    server.reset().await;
    mount_active_doctor(&server, doctor_id).await;
    mount_booked_times(&server, json!([{ "preferred_time": "10:00:00" }])).await;
    let slots = SlotService::new(&config(&server))
        .available_slots(
            AvailableSlotsQuery {
                doctor_id: Some(doctor_id.to_string()),
                date: Some("2025-06-10".into()),
            },
            today(),
        )
        .await
        .unwrap();
    let ten = slots.slots.iter().find(|s| s.time == "10:00").unwrap();
    assert!(!ten.available);
    assert_eq!(slots.slots.iter().filter(|s| s.available).count(), 15);

    // a second booking of the same triple conflicts
    server.reset().await;
    mount_active_doctor(&server, doctor_id).await;
    mount_slot_count(&server, 1).await;
    let second = BookingService::new(&config(&server))
        .book(booking(doctor_id, "10:00"), today())
        .await;
    assert_matches!(second, Err(AppointmentError::SlotTaken));

    // complete before approval is refused without writing
    server.reset().await;
    mount_current(
        &server,
        MockSupabaseResponses::appointment_row(appointment_id, doctor_id, "pending", None),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    let early = AppointmentLifecycleService::new(&config(&server))
        .apply(appointment_id, LifecycleAction::Complete, None)
        .await;
    assert_matches!(
        early,
        Err(AppointmentError::InvalidTransition(msg))
            if msg == "Only confirmed appointments can be marked as completed"
    );

    // approve stamps confirmed_at in a status-guarded write
    server.reset().await;
    mount_current(
        &server,
        MockSupabaseResponses::appointment_row(appointment_id, doctor_id, "pending", None),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                appointment_id,
                doctor_id,
                "confirmed",
                Some("2025-06-02T10:00:00Z"),
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let approved = AppointmentLifecycleService::new(&config(&server))
        .apply(appointment_id, LifecycleAction::Approve, Some("See you soon".into()))
        .await
        .unwrap();
    assert_eq!(approved.status, AppointmentStatus::Confirmed);
    assert!(approved.confirmed_at.is_some());

    let patch = last_patch_body(&server).await;
    assert_eq!(patch["status"], "confirmed");
    assert_eq!(patch["admin_notes"], "See you soon");
    assert!(patch.get("confirmed_at").is_some());
}

#[tokio::test]
async fn insert_race_on_unique_index_is_a_conflict() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    mount_active_doctor(&server, doctor_id).await;
    mount_slot_count(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "23505",
            "duplicate key value violates unique constraint \"appointments_active_slot_unique\"",
        )))
        .mount(&server)
        .await;

    let result = BookingService::new(&config(&server))
        .book(booking(doctor_id, "10:00"), today())
        .await;

    assert_matches!(result, Err(AppointmentError::SlotTaken));
}

#[tokio::test]
async fn booking_today_or_with_bad_fields_is_rejected_per_field() {
    let server = MockServer::start().await;
    let mut request = booking(Uuid::new_v4(), "10am");
    request.appointment_date = Some("2025-06-01".into());
    request.patient_email = Some("not-an-email".into());
    request.patient_name = None;

    let result = BookingService::new(&config(&server)).book(request, today()).await;

    let errors = match result {
        Err(AppointmentError::Validation(errors)) => errors,
        other => panic!("expected validation failure, got {:?}", other),
    };
    assert!(errors.has("appointment_date"));
    assert!(errors.has("appointment_time"));
    assert!(errors.has("patient_email"));
    assert!(errors.has("patient_name"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn inactive_doctor_cannot_be_booked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = BookingService::new(&config(&server))
        .book(booking(Uuid::new_v4(), "10:00"), today())
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorUnavailable));
}

#[tokio::test]
async fn slots_require_a_future_date() {
    let server = MockServer::start().await;
    let result = SlotService::new(&config(&server))
        .available_slots(
            AvailableSlotsQuery {
                doctor_id: Some(Uuid::new_v4().to_string()),
                date: Some("2025-06-01".into()),
            },
            today(),
        )
        .await;

    assert_matches!(result, Err(AppointmentError::Validation(errors)) if errors.has("date"));
}

#[tokio::test]
async fn lifecycle_write_losing_a_race_is_reported() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    mount_current(
        &server,
        MockSupabaseResponses::appointment_row(id, Uuid::new_v4(), "confirmed", Some("2025-06-02T10:00:00Z")),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = AppointmentLifecycleService::new(&config(&server))
        .apply(id, LifecycleAction::Cancel, None)
        .await;

    assert_matches!(result, Err(AppointmentError::ConcurrentModification));
}

#[tokio::test]
async fn check_status_without_matches_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_email", "eq.jane@example.com"))
        .and(query_param("order", "preferred_date.desc,preferred_time.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = BookingService::new(&config(&server))
        .check_status(CheckStatusRequest {
            patient_email: Some("jane@example.com".into()),
            patient_phone: Some("+15550111".into()),
        })
        .await;

    assert_matches!(result, Err(AppointmentError::NoneFound));
}

#[tokio::test]
async fn admin_update_cannot_return_to_pending() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    mount_current(
        &server,
        MockSupabaseResponses::appointment_row(id, Uuid::new_v4(), "confirmed", Some("2025-06-02T10:00:00Z")),
    )
    .await;

    let result = AppointmentService::new(&config(&server))
        .update(
            id,
            UpdateAppointmentRequest {
                status: Some("pending".into()),
                ..Default::default()
            },
            today(),
        )
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidTransition(msg)) if msg == "Appointment status cannot be reset to pending"
    );
}

#[tokio::test]
async fn admin_update_routes_status_through_lifecycle() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    mount_current(
        &server,
        MockSupabaseResponses::appointment_row(id, doctor_id, "confirmed", Some("2025-06-02T10:00:00Z")),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.confirmed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(id, doctor_id, "completed", Some("2025-06-02T10:00:00Z"))
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let updated = AppointmentService::new(&config(&server))
        .update(
            id,
            UpdateAppointmentRequest {
                status: Some("completed".into()),
                admin_notes: Some("Follow-up in a month".into()),
                ..Default::default()
            },
            today(),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Completed);
    let patch = last_patch_body(&server).await;
    assert_eq!(patch["status"], "completed");
    assert_eq!(patch["admin_notes"], "Follow-up in a month");
    assert!(patch.get("confirmed_at").is_none());
}

#[tokio::test]
async fn statistics_fan_out_counts() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/4"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("preferred_date", "eq.2025-06-01"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/2"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/9"))
        .mount(&server)
        .await;

    let stats = AppointmentService::new(&config(&server))
        .statistics(today())
        .await
        .unwrap();

    assert_eq!(stats.pending, 4);
    assert_eq!(stats.today, 2);
    assert_eq!(stats.total, 9);
    assert_eq!(stats.this_month, 9);
}
