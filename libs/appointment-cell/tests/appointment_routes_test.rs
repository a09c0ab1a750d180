use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{appointment_admin_routes, appointment_public_routes};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestToken, TestUser};

async fn send(app: Router, method_: Method, uri: &str, bearer: Option<String>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method_).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(AUTHORIZATION, bearer);
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Mounts the token and user lookups the admin middleware performs.
async fn mount_admin_session(server: &MockServer) -> String {
    let admin = TestUser::admin("admin@clinic.test");
    let token = TestToken::issue();
    Mock::given(method("GET"))
        .and(path("/rest/v1/personal_access_tokens"))
        .and(query_param("token", format!("eq.{}", token.digest)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([token.to_row(admin.id, None)])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", admin.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([admin.to_row(None)])))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/personal_access_tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    token.bearer()
}

#[tokio::test]
async fn admin_routes_require_a_token() {
    let server = MockServer::start().await;
    let app = appointment_admin_routes(TestConfig::with_url(&server.uri()).to_arc());

    let (status, body) = send(app, Method::GET, "/statistics", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthenticated");
}

#[tokio::test]
async fn admin_list_returns_paginated_resources() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    let doctor_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.pending"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "15"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "0-0/1")
                .set_body_json(json!([MockSupabaseResponses::appointment_row(
                    Uuid::new_v4(),
                    doctor_id,
                    "pending",
                    None
                )])),
        )
        .mount(&server)
        .await;

    let app = appointment_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(
        app,
        Method::GET,
        "/?status=pending&sort_by=password&doctor_id=",
        Some(bearer),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Appointments retrieved successfully");
    let data = &body["data"];
    assert_eq!(data["appointments"][0]["status"], "pending");
    assert_eq!(data["appointments"][0]["doctor"]["id"], doctor_id.to_string());
    assert!(data["appointments"][0]["service"]["id"].is_null());
    assert_eq!(data["pagination"]["total"], 1);
    assert_eq!(data["pagination"]["last_page"], 1);
    assert_eq!(data["pagination"]["from"], 1);
}

#[tokio::test]
async fn cancelling_a_completed_appointment_is_a_state_error() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(id, Uuid::new_v4(), "completed", Some("2025-06-02T10:00:00Z"))
        ])))
        .mount(&server)
        .await;

    let app = appointment_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::POST, &format!("/{}/cancel", id), Some(bearer), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Cannot cancel a completed appointment");
}

#[tokio::test]
async fn missing_appointment_is_not_found() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let app = appointment_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::GET, &format!("/{}", Uuid::new_v4()), Some(bearer), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Appointment not found");
}

#[tokio::test]
async fn public_booking_validation_errors_are_unprocessable() {
    let server = MockServer::start().await;
    let app = appointment_public_routes(TestConfig::with_url(&server.uri()).to_arc());

    let (status, body) = send(
        app,
        Method::POST,
        "/",
        None,
        Some(json!({ "patient_name": "Jane", "appointment_time": "25:99" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert!(body["errors"]["doctor_id"].is_array());
    assert!(body["errors"]["appointment_time"].is_array());
    assert!(body["errors"]["patient_email"].is_array());
}

#[tokio::test]
async fn public_booking_conflict_is_409() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockSupabaseResponses::doctor_row(doctor_id, "Dr Who", true)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/1"))
        .mount(&server)
        .await;

    let app = appointment_public_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(
        app,
        Method::POST,
        "/",
        None,
        Some(json!({
            "patient_name": "Jane Patient",
            "patient_email": "jane@example.com",
            "patient_phone": "+15550111",
            "doctor_id": doctor_id,
            "appointment_date": "2999-01-04",
            "appointment_time": "10:00"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["message"],
        "This time slot is already booked. Please choose another time."
    );
}
