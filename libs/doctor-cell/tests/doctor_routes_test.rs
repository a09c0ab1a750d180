use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::{doctor_admin_routes, doctor_public_routes};
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

fn doctor_with_count(id: Uuid, active: bool, appointments: u64) -> Value {
    let mut row = MockSupabaseResponses::doctor_row(id, "Dr Grey", active);
    row["appointments"] = json!([{ "count": appointments }]);
    row
}

async fn mount_doctor(server: &MockServer, row: Value) {
    let id = row["id"].as_str().unwrap().to_string();
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("role", "eq.doctor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_doctor_hashes_password_and_sets_role() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    let id = Uuid::new_v4();
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/0"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({ "role": "doctor", "email": "grey@clinic.test", "is_active": true })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([MockSupabaseResponses::doctor_row(id, "Dr Grey", true)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let app = doctor_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(
        app,
        Method::POST,
        "/",
        Some(bearer),
        Some(json!({
            "name": "Dr Grey",
            "email": "grey@clinic.test",
            "password": "long-enough",
            "specialization": "Cardiology",
            "years_of_experience": 7,
            "consultation_fee": 150
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Doctor created successfully");
    assert_eq!(body["data"]["experience_level"], "Senior");
    assert_eq!(body["data"]["consultation_fee"], "150.00");

    let requests = server.received_requests().await.unwrap();
    let insert = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
    let sent: Value = serde_json::from_slice(&insert.body).unwrap();
    let stored = sent["password"].as_str().unwrap();
    assert!(stored.starts_with("$argon2"));
    assert_ne!(stored, "long-enough");
}

#[tokio::test]
async fn create_doctor_reports_every_invalid_field() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;

    let app = doctor_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(
        app,
        Method::POST,
        "/",
        Some(bearer),
        Some(json!({ "email": "nope", "password": "short", "years_of_experience": 80 })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["name"][0], "Doctor name is required");
    assert_eq!(body["errors"]["email"][0], "Please provide a valid email address");
    assert_eq!(body["errors"]["password"][0], "Password must be at least 8 characters");
    assert_eq!(body["errors"]["specialization"][0], "Specialization is required");
    assert_eq!(body["errors"]["years_of_experience"][0], "Years of experience cannot exceed 70");
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.grey@clinic.test"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/1"))
        .mount(&server)
        .await;

    let app = doctor_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(
        app,
        Method::POST,
        "/",
        Some(bearer),
        Some(json!({
            "name": "Dr Grey",
            "email": "grey@clinic.test",
            "password": "long-enough",
            "specialization": "Cardiology"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "This email address is already registered");
}

async fn mount_guarded_delete(server: &MockServer, id: Uuid, outcome: Value) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/delete_doctor_if_unbooked"))
        .and(body_partial_json(json!({ "target_id": id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(outcome))
        .expect(1)
        .mount(server)
        .await;
    // the check and the delete never run as separate requests
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn doctor_with_appointments_cannot_be_deleted() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    let id = Uuid::new_v4();
    mount_guarded_delete(&server, id, json!({ "deleted": false, "appointments": 2 })).await;

    let app = doctor_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::DELETE, &format!("/{}", id), Some(bearer), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Cannot delete doctor. They have 2 associated appointment(s). Please deactivate instead."
    );
}

#[tokio::test]
async fn unbooked_doctor_is_deleted_in_one_call() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    let id = Uuid::new_v4();
    mount_guarded_delete(&server, id, json!({ "deleted": true, "appointments": 0 })).await;

    let app = doctor_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::DELETE, &format!("/{}", id), Some(bearer), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Doctor deleted successfully");
}

#[tokio::test]
async fn deleting_an_unknown_doctor_is_not_found() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    let id = Uuid::new_v4();
    mount_guarded_delete(&server, id, Value::Null).await;

    let app = doctor_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::DELETE, &format!("/{}", id), Some(bearer), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Doctor not found");
}

#[tokio::test]
async fn malformed_delete_outcome_is_a_server_error() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    let id = Uuid::new_v4();
    mount_guarded_delete(&server, id, json!({ "deleted": false })).await;

    let app = doctor_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, _) = send(app, Method::DELETE, &format!("/{}", id), Some(bearer), None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn activating_an_active_doctor_is_refused() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    let id = Uuid::new_v4();
    mount_doctor(&server, doctor_with_count(id, true, 0)).await;

    let app = doctor_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::POST, &format!("/{}/activate", id), Some(bearer), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Doctor is already active");
}

#[tokio::test]
async fn deactivation_is_guarded_on_current_flag() {
    let server = MockServer::start().await;
    let bearer = mount_admin_session(&server).await;
    let id = Uuid::new_v4();
    mount_doctor(&server, doctor_with_count(id, true, 1)).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("is_active", "eq.true"))
        .and(body_partial_json(json!({ "is_active": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_with_count(id, false, 1)])))
        .expect(1)
        .mount(&server)
        .await;

    let app = doctor_admin_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::POST, &format!("/{}/deactivate", id), Some(bearer), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Doctor deactivated successfully");
    assert_eq!(body["data"]["is_active"], false);
    assert_eq!(body["data"]["appointments_count"], 1);
}

#[tokio::test]
async fn public_listing_only_shows_active_doctors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("role", "eq.doctor"))
        .and(query_param("is_active", "eq.true"))
        .and(query_param("order", "name.asc"))
        .and(query_param("limit", "12"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "0-0/1")
                .set_body_json(json!([MockSupabaseResponses::doctor_row(Uuid::new_v4(), "Dr Grey", true)])),
        )
        .mount(&server)
        .await;

    let app = doctor_public_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::GET, "/", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["doctors"][0]["name"], "Dr Grey");
    assert_eq!(body["data"]["pagination"]["per_page"], 12);
}

#[tokio::test]
async fn public_listing_rejects_non_numeric_fee() {
    let server = MockServer::start().await;
    let app = doctor_public_routes(TestConfig::with_url(&server.uri()).to_arc());

    let (status, body) = send(app, Method::GET, "/?min_fee=cheap", None, None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["min_fee"].is_array());
}

#[tokio::test]
async fn inactive_doctor_profile_is_hidden() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let app = doctor_public_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::GET, &format!("/{}", Uuid::new_v4()), None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Doctor not found");
}

#[tokio::test]
async fn public_specializations_are_distinct() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("select", "specialization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "specialization": "Surgery" },
            { "specialization": "Cardiology" },
            { "specialization": "Surgery" }
        ])))
        .mount(&server)
        .await;

    let app = doctor_public_routes(TestConfig::with_url(&server.uri()).to_arc());
    let (status, body) = send(app, Method::GET, "/specializations", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["Cardiology", "Surgery"]));
}
