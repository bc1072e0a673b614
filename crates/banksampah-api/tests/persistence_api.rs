mod common;

use axum_test::TestServer;
use banksampah_api::{create_router, AppState};
use common::{add_waste_type, login, register, test_settings};
use serde_json::{json, Value};

async fn server_for(settings: banksampah_core::Settings) -> TestServer {
    let state = AppState::new(settings).await.expect("app state");
    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn snapshot_keeps_accounts_and_ledger_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings();
    settings.storage.snapshot_path = Some(dir.path().join("bank.json"));

    {
        let server = server_for(settings.clone()).await;
        register(&server, "petugas", "rahasia123").await;
        let token = login(&server, "petugas", "rahasia123").await["accessToken"]
            .as_str()
            .unwrap()
            .to_string();
        let plastik = add_waste_type(&server, &token, "Plastik", 2000).await;
        let resp = server
            .post("/transactions/deposit")
            .authorization_bearer(&token)
            .json(&json!({
                "name": "Siti",
                "date": "2024-05-01",
                "deposits": [{ "wasteTypeId": plastik, "amount": 3 }],
            }))
            .await;
        assert_eq!(resp.status_code(), 201);
    }

    assert!(dir.path().join("bank.json").exists());

    let server = server_for(settings).await;
    let token = login(&server, "petugas", "rahasia123").await["accessToken"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = server
        .get("/balances/Siti")
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.json::<Value>()["totalBalance"], 6000);

    let resp = server.get("/stock").authorization_bearer(&token).await;
    let levels: Vec<Value> = resp.json();
    assert_eq!(levels[0]["quantityKg"], 3.0);
}
