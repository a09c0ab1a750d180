/// Endpoint smoke suite run against a live server.
///
/// Configuration comes from the environment:
/// - `API_BASE_URL` (default `http://localhost:3000`)
/// - `ADMIN_EMAIL` / `ADMIN_PASSWORD` for the admin section; skipped when unset
///
/// Test Categories:
/// - Health and public catalogue
/// - Admin authentication
/// - Admin service and blog management
/// - Booking, slot lookup and status check
/// - Contact form
use chrono::{Days, Utc};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Test client that carries the admin bearer token once logged in
pub struct ApiTestClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiTestClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            auth_token: None,
        }
    }

    /// Log in as admin and keep the issued token
    pub async fn login(&mut self, email: &str, password: &str) -> TestResult<()> {
        let response = self
            .post("/v1/admin/login", json!({ "email": email, "password": password }))
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;

        match body["data"]["token"].as_str() {
            Some(token) if status == StatusCode::OK => {
                self.auth_token = Some(token.to_string());
                Ok(())
            }
            _ => Err(format!("login failed with {}: {}", status, body["message"]).into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn get(&self, path: &str) -> TestResult<Response> {
        Ok(self.authorize(self.client.get(self.url(path))).send().await?)
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResult<Response> {
        Ok(self
            .authorize(self.client.post(self.url(path)).json(&body))
            .send()
            .await?)
    }

    pub async fn delete(&self, path: &str) -> TestResult<Response> {
        Ok(self.authorize(self.client.delete(self.url(path))).send().await?)
    }
}

/// Test results tracker
#[derive(Debug, Default)]
pub struct TestResults {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub failures: Vec<String>,
}

impl TestResults {
    pub fn pass(&mut self, test_name: &str) {
        self.passed += 1;
        println!("✅ {}", test_name);
    }

    pub fn fail(&mut self, test_name: &str, error: &str) {
        self.failed += 1;
        self.failures.push(format!("{}: {}", test_name, error));
        println!("❌ {}: {}", test_name, error);
    }

    pub fn skip(&mut self, test_name: &str, reason: &str) {
        self.skipped += 1;
        println!("⚠️ {} (skipped: {})", test_name, reason);
    }

    /// Records a pass when the response carries `expected`, and returns the body.
    pub async fn expect(
        &mut self,
        test_name: &str,
        response: TestResult<Response>,
        expected: StatusCode,
    ) -> Option<Value> {
        match response {
            Ok(response) => {
                let status = response.status();
                let body = response.json::<Value>().await.unwrap_or(Value::Null);
                if status == expected {
                    self.pass(test_name);
                    Some(body)
                } else {
                    self.fail(test_name, &format!("Status: {} ({})", status, body["message"]));
                    None
                }
            }
            Err(e) => {
                self.fail(test_name, &e.to_string());
                None
            }
        }
    }

    pub fn summary(&self) {
        println!("\n📊 Test Summary:");
        println!("✅ Passed: {}", self.passed);
        println!("❌ Failed: {}", self.failed);
        println!("⚠️ Skipped: {}", self.skipped);

        if !self.failures.is_empty() {
            println!("\n🔍 Failures:");
            for failure in &self.failures {
                println!("  - {}", failure);
            }
        }
    }
}

async fn public_tests(client: &ApiTestClient, results: &mut TestResults) -> Option<Value> {
    println!("\n🌐 Public Catalogue Tests");

    results.expect("Health Check", client.get("/health").await, StatusCode::OK).await;
    let services = results
        .expect("Public Service List", client.get("/v1/services").await, StatusCode::OK)
        .await;
    results
        .expect("Featured Services", client.get("/v1/services/featured").await, StatusCode::OK)
        .await;
    results
        .expect("Unknown Service Slug", client.get("/v1/services/no-such-service").await, StatusCode::NOT_FOUND)
        .await;
    let doctors = results
        .expect("Public Doctor List", client.get("/v1/doctors").await, StatusCode::OK)
        .await;
    results
        .expect("Doctor Specializations", client.get("/v1/doctors/specializations").await, StatusCode::OK)
        .await;
    results
        .expect(
            "Unknown Doctor",
            client.get(&format!("/v1/doctors/{}", Uuid::new_v4())).await,
            StatusCode::NOT_FOUND,
        )
        .await;
    results
        .expect("Public Blog List", client.get("/v1/blogs").await, StatusCode::OK)
        .await;
    results
        .expect("Blog Categories", client.get("/v1/blogs/categories").await, StatusCode::OK)
        .await;

    let first_doctor = doctors.as_ref().and_then(|d| d["data"]["doctors"].get(0).cloned());
    let first_service = services.as_ref().and_then(|s| s["data"]["services"].get(0).cloned());
    match (first_doctor, first_service) {
        (Some(doctor), Some(service)) => Some(json!({ "doctor": doctor, "service": service })),
        _ => None,
    }
}

async fn booking_tests(client: &ApiTestClient, results: &mut TestResults, catalogue: Option<Value>) {
    println!("\n📅 Booking Tests");

    results
        .expect(
            "Booking Validation",
            client.post("/v1/appointments", json!({})).await,
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await;

    let Some(catalogue) = catalogue else {
        results.skip("Available Slots", "no active doctor or service");
        results.skip("Book Appointment", "no active doctor or service");
        return;
    };

    let doctor_id = catalogue["doctor"]["id"].as_str().unwrap_or_default().to_string();
    let service_id = catalogue["service"]["id"].as_str().unwrap_or_default().to_string();
    let date = (Utc::now().date_naive() + Days::new(1)).to_string();

    let slots = results
        .expect(
            "Available Slots",
            client
                .get(&format!("/v1/appointments/available-slots?doctor_id={}&date={}", doctor_id, date))
                .await,
            StatusCode::OK,
        )
        .await;

    let slot = slots
        .as_ref()
        .and_then(|s| s["data"]["slots"].as_array())
        .and_then(|slots| slots.iter().find(|slot| slot["available"] == true))
        .and_then(|slot| slot["time"].as_str());
    let Some(slot) = slot else {
        results.skip("Book Appointment", "no free slot tomorrow");
        return;
    };

    let email = format!("smoke-{}@example.com", Uuid::new_v4().simple());
    let booking = json!({
        "patient_name": "Smoke Test",
        "patient_email": email,
        "patient_phone": "+1 555 0100",
        "doctor_id": doctor_id,
        "service_id": service_id,
        "appointment_date": date,
        "appointment_time": slot,
        "notes": "Endpoint smoke test"
    });
    results
        .expect("Book Appointment", client.post("/v1/appointments", booking.clone()).await, StatusCode::CREATED)
        .await;
    results
        .expect("Double Booking Rejected", client.post("/v1/appointments", booking).await, StatusCode::CONFLICT)
        .await;
    results
        .expect(
            "Check Status",
            client
                .post(
                    "/v1/appointments/check-status",
                    json!({ "patient_email": email, "patient_phone": "+1 555 0100" }),
                )
                .await,
            StatusCode::OK,
        )
        .await;
}

async fn admin_tests(client: &mut ApiTestClient, results: &mut TestResults) -> TestResult<()> {
    println!("\n🔐 Admin Tests");

    results
        .expect("Admin Without Token", client.get("/v1/admin/me").await, StatusCode::UNAUTHORIZED)
        .await;

    let (email, password) = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
        (Ok(email), Ok(password)) => (email, password),
        _ => {
            results.skip("Admin Login", "ADMIN_EMAIL / ADMIN_PASSWORD not set");
            return Ok(());
        }
    };

    match client.login(&email, &password).await {
        Ok(()) => results.pass("Admin Login"),
        Err(e) => {
            results.fail("Admin Login", &e.to_string());
            return Ok(());
        }
    }

    results.expect("Admin Profile", client.get("/v1/admin/me").await, StatusCode::OK).await;
    results
        .expect("Appointment Statistics", client.get("/v1/admin/appointments/statistics").await, StatusCode::OK)
        .await;
    results
        .expect("Doctor Statistics", client.get("/v1/admin/doctors/statistics").await, StatusCode::OK)
        .await;

    let name = format!("Smoke Service {}", Uuid::new_v4().simple());
    let created = results
        .expect(
            "Create Service",
            client
                .post(
                    "/v1/admin/services",
                    json!({
                        "name": name,
                        "description": "Created by the endpoint smoke suite",
                        "price": 50,
                        "duration": 30,
                        "is_active": false
                    }),
                )
                .await,
            StatusCode::CREATED,
        )
        .await;

    if let Some(id) = created.as_ref().and_then(|c| c["data"]["id"].as_str()) {
        results
            .expect(
                "Duplicate Service Name",
                client
                    .post(
                        "/v1/admin/services",
                        json!({ "name": name, "description": "again", "price": 50, "duration": 30 }),
                    )
                    .await,
                StatusCode::CONFLICT,
            )
            .await;
        results
            .expect("Delete Service", client.delete(&format!("/v1/admin/services/{}", id)).await, StatusCode::OK)
            .await;
    }

    let title = format!("Smoke Post {}", Uuid::new_v4().simple());
    let blog = results
        .expect(
            "Create Blog",
            client
                .post("/v1/admin/blogs", json!({ "title": title, "content": "Short body." }))
                .await,
            StatusCode::CREATED,
        )
        .await;
    if let Some(id) = blog.as_ref().and_then(|b| b["data"]["id"].as_str()) {
        results
            .expect("Publish Blog", client.post(&format!("/v1/admin/blogs/{}/publish", id), json!({})).await, StatusCode::OK)
            .await;
        results
            .expect(
                "Publish Twice Rejected",
                client.post(&format!("/v1/admin/blogs/{}/publish", id), json!({})).await,
                StatusCode::BAD_REQUEST,
            )
            .await;
        results
            .expect("Delete Blog", client.delete(&format!("/v1/admin/blogs/{}", id)).await, StatusCode::OK)
            .await;
    }

    results
        .expect("Admin Logout", client.post("/v1/admin/logout", json!({})).await, StatusCode::OK)
        .await;
    Ok(())
}

async fn contact_tests(client: &ApiTestClient, results: &mut TestResults) {
    println!("\n✉️ Contact Tests");

    results
        .expect("Contact Info", client.get("/v1/contact/info").await, StatusCode::OK)
        .await;
    results
        .expect(
            "Contact Submission",
            client
                .post(
                    "/v1/contact",
                    json!({
                        "name": "Smoke Test",
                        "email": "smoke@example.com",
                        "subject": "Endpoint smoke test",
                        "message": "Please ignore."
                    }),
                )
                .await,
            StatusCode::CREATED,
        )
        .await;
}

pub async fn run_endpoint_tests() -> TestResult<TestResults> {
    let base_url = std::env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let mut client = ApiTestClient::new(base_url.clone());
    let mut results = TestResults::default();

    println!("🚀 Starting Endpoint Smoke Tests");
    println!("📍 Base URL: {}", base_url);

    let catalogue = public_tests(&client, &mut results).await;
    booking_tests(&client, &mut results, catalogue).await;
    contact_tests(&client, &mut results).await;
    admin_tests(&mut client, &mut results).await?;

    Ok(results)
}

#[tokio::main]
async fn main() -> TestResult<()> {
    let results = run_endpoint_tests().await?;
    results.summary();

    if results.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
