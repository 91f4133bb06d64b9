//! Shared harness for the integration suites.
//!
//! Each test gets its own freshly created database and a full application
//! (HTTP server, dispatch worker, scheduler) on a random port. Tests skip
//! when `TEST_DATABASE_URL` is not set.

#![allow(dead_code)]

use serde_json::Value;
use sqlx::{Connection, Executor, PgConnection};
use uuid::Uuid;

use signing_service::config::{DatabaseConfig, SigningConfig, SmtpConfig, WorkflowConfig};
use signing_service::services::Database;
use signing_service::startup::Application;

pub struct TestApp {
    pub address: String,
    pub db: Database,
    pub client: reqwest::Client,
}

/// Boot a full application against a fresh database, or `None` when no test
/// database is configured.
pub async fn spawn_app() -> Option<TestApp> {
    let Ok(base_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping integration test");
        return None;
    };
    service_core::observability::logging::init_test_tracing("warn");

    let db_name = format!("signing_test_{}", Uuid::new_v4().simple());
    let mut conn = PgConnection::connect(&base_url)
        .await
        .expect("Failed to connect to postgres");
    conn.execute(format!(r#"CREATE DATABASE "{db_name}""#).as_str())
        .await
        .expect("Failed to create test database");

    let db_url = swap_database(&base_url, &db_name);
    let config = SigningConfig {
        service_name: "signing-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "warn".to_string(),
        port: 0,
        database: DatabaseConfig {
            url: db_url.clone(),
            max_connections: 5,
            min_connections: 1,
        },
        smtp: SmtpConfig {
            enabled: false,
            host: "localhost".to_string(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from_name: "Signing Service".to_string(),
            from_email: "no-reply@example.com".to_string(),
        },
        workflow: WorkflowConfig {
            reminder_interval_hours: 24,
            expiry_warning_hours: 24,
            // Long enough that only explicit /sweeps/run triggers sweeps.
            sweep_interval_seconds: 3600,
            dispatch_queue_size: 64,
        },
    };

    let application = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = application.port();
    tokio::spawn(application.run_until_stopped());

    let db = Database::new(&db_url, 5, 1)
        .await
        .expect("Failed to connect to test database");

    Some(TestApp {
        address: format!("http://127.0.0.1:{port}"),
        db,
        client: reqwest::Client::new(),
    })
}

/// Point the connection string at another database name.
fn swap_database(base_url: &str, db_name: &str) -> String {
    let (prefix, _) = base_url
        .rsplit_once('/')
        .expect("TEST_DATABASE_URL must contain a database path");
    format!("{prefix}/{db_name}")
}

impl TestApp {
    pub async fn create_request(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/requests", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create-and-send a request, returning its JSON representation.
    pub async fn create_request_ok(&self, body: Value) -> Value {
        let response = self.create_request(body).await;
        assert_eq!(response.status().as_u16(), 201, "create_request failed");
        response.json().await.expect("Invalid response body")
    }

    pub async fn get_request(&self, request_id: &str) -> Value {
        let response = self
            .client
            .get(format!("{}/requests/{request_id}", self.address))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200, "get_request failed");
        response.json().await.expect("Invalid response body")
    }

    pub async fn submit_action(
        &self,
        request_id: &str,
        signer_id: &str,
        body: Value,
    ) -> reqwest::Response {
        self.client
            .post(format!(
                "{}/requests/{request_id}/signers/{signer_id}/actions",
                self.address
            ))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn run_sweep(&self) -> Value {
        let response = self
            .client
            .post(format!("{}/sweeps/run", self.address))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200, "run_sweep failed");
        response.json().await.expect("Invalid response body")
    }

    pub async fn grant_exemption(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/exemptions", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn revoke_exemption(&self, exemption_id: &str, body: Value) -> reqwest::Response {
        self.client
            .delete(format!("{}/exemptions/{exemption_id}", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn notifications(&self, request_id: &str) -> Vec<Value> {
        let response = self
            .client
            .get(format!(
                "{}/requests/{request_id}/notifications",
                self.address
            ))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.expect("Invalid response body")
    }

    /// Poll the notification log until `predicate` matches at least `min`
    /// rows, or the deadline passes. Dispatch is asynchronous.
    pub async fn wait_for_notifications<F>(
        &self,
        request_id: &str,
        min: usize,
        predicate: F,
    ) -> Vec<Value>
    where
        F: Fn(&Value) -> bool,
    {
        for _ in 0..50 {
            let logs = self.notifications(request_id).await;
            let matched: Vec<Value> = logs.into_iter().filter(|l| predicate(l)).collect();
            if matched.len() >= min {
                return matched;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Expected at least {min} matching notifications for {request_id}");
    }
}

/// Pull the signer ids out of a request body, ordered by signing order.
pub fn signer_ids(request: &Value) -> Vec<String> {
    let mut signers: Vec<&Value> = request["signers"]
        .as_array()
        .expect("signers array")
        .iter()
        .collect();
    signers.sort_by_key(|s| s["signing_order"].as_i64().unwrap_or(0));
    signers
        .iter()
        .map(|s| s["signer_id"].as_str().expect("signer_id").to_string())
        .collect()
}

pub fn sequential_request_body(signer_count: usize) -> Value {
    request_body("sequential", signer_count, false)
}

pub fn request_body(mode: &str, signer_count: usize, requires_second_factor: bool) -> Value {
    let signers: Vec<Value> = (1..=signer_count)
        .map(|i| serde_json::json!({ "email": format!("signer{i}@example.com") }))
        .collect();
    serde_json::json!({
        "organization_id": Uuid::new_v4(),
        "owner_email": "owner@example.com",
        "title": "Master services agreement",
        "signing_mode": mode,
        "requires_second_factor": requires_second_factor,
        "signers": signers,
    })
}
