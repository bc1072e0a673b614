#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum_test::TestServer;
use banksampah_api::{create_router, AppState};
use banksampah_core::{BankStore, MemoryStore, Receipt, ReceiptSender, Settings};
use serde_json::{json, Value};
use tokio::sync::Mutex;

/// Receipt sender that keeps everything it is asked to send.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<Receipt>>,
}

#[async_trait]
impl ReceiptSender for RecordingSender {
    async fn send(&self, receipt: &Receipt) -> banksampah_core::Result<()> {
        self.sent.lock().await.push(receipt.clone());
        Ok(())
    }
}

impl RecordingSender {
    /// Waits for background deliveries to land.
    pub async fn wait_for(&self, count: usize) -> Vec<Receipt> {
        for _ in 0..50 {
            {
                let sent = self.sent.lock().await;
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent.lock().await.clone()
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<MemoryStore>,
    pub receipts: Arc<RecordingSender>,
}

pub fn test_settings() -> Settings {
    let mut settings = Settings {
        env: "test".into(),
        ..Default::default()
    };
    settings.auth.jwt_secret = Some("test-secret-test-secret-test-secret!".to_string().into());
    settings
}

pub fn spawn_app_with(settings: Settings) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let receipts = Arc::new(RecordingSender::default());
    let state = AppState::from_parts(
        settings,
        store.clone() as Arc<dyn BankStore>,
        receipts.clone() as Arc<dyn ReceiptSender>,
    )
    .expect("app state");
    let server = TestServer::new(create_router(state)).unwrap();
    TestApp {
        server,
        store,
        receipts,
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_settings())
}

pub async fn register(server: &TestServer, username: &str, password: &str) {
    let resp = server
        .post("/auth/register")
        .json(&json!({
            "email": format!("{username}@example.com"),
            "password": password,
            "confirmPassword": password,
            "username": username,
        }))
        .await;
    assert_eq!(resp.status_code(), 201, "{}", resp.text());
}

pub async fn login(server: &TestServer, username: &str, password: &str) -> Value {
    let resp = server
        .post("/auth/login")
        .json(&json!({ "username": username, "password": password }))
        .await;
    assert_eq!(resp.status_code(), 200, "{}", resp.text());
    resp.json::<Value>()
}

/// Registers a staff account and returns its access token.
pub async fn staff_token(server: &TestServer) -> String {
    register(server, "petugas", "rahasia123").await;
    let body = login(server, "petugas", "rahasia123").await;
    body["accessToken"].as_str().unwrap().to_string()
}

pub async fn add_waste_type(server: &TestServer, token: &str, name: &str, price: i64) -> String {
    let resp = server
        .post("/wastetypes")
        .authorization_bearer(token)
        .json(&json!({ "name": name, "pricePerKg": price }))
        .await;
    assert_eq!(resp.status_code(), 201, "{}", resp.text());
    resp.json::<Value>()["wasteTypeId"]
        .as_str()
        .unwrap()
        .to_string()
}

pub async fn add_customer(
    server: &TestServer,
    token: &str,
    name: &str,
    phone: &str,
    email: Option<&str>,
) -> String {
    let resp = server
        .post("/customers")
        .authorization_bearer(token)
        .json(&json!({
            "name": name,
            "phoneNumber": phone,
            "address": "Jl. Melati 7",
            "email": email,
        }))
        .await;
    assert_eq!(resp.status_code(), 201, "{}", resp.text());
    resp.json::<Value>()["customerId"]
        .as_str()
        .unwrap()
        .to_string()
}
