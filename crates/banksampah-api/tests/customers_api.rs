mod common;

use common::{add_customer, add_waste_type, spawn_app, staff_token};
use serde_json::{json, Value};

#[tokio::test]
async fn customer_crud() {
    let app = spawn_app();
    let token = staff_token(&app.server).await;

    let resp = app.server.get("/customers").authorization_bearer(&token).await;
    assert_eq!(resp.status_code(), 404);
    assert_eq!(resp.json::<Value>()["error"], "No customers found.");

    let resp = app
        .server
        .post("/customers")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Siti", "address": "Jl. Mawar 1" }))
        .await;
    assert_eq!(resp.status_code(), 400);
    assert_eq!(
        resp.json::<Value>()["error"],
        "All fields (name, phoneNumber, and address) are required."
    );

    let id = add_customer(&app.server, &token, "Siti", "0811", Some("siti@example.com")).await;

    let resp = app
        .server
        .get(&format!("/customers/{id}"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 200);
    let customer: Value = resp.json();
    assert_eq!(customer["name"], "Siti");
    assert_eq!(customer["phoneNumber"], "0811");
    assert_eq!(customer["email"], "siti@example.com");

    let resp = app
        .server
        .put(&format!("/customers/{id}"))
        .authorization_bearer(&token)
        .json(&json!({ "address": "Jl. Kenanga 3" }))
        .await;
    assert_eq!(resp.status_code(), 200);
    assert_eq!(
        resp.json::<Value>()["message"],
        "Customer data updated successfully"
    );

    let resp = app
        .server
        .put(&format!("/customers/{id}"))
        .authorization_bearer(&token)
        .json(&json!({}))
        .await;
    assert_eq!(resp.status_code(), 400);

    let resp = app
        .server
        .get("/customers")
        .authorization_bearer(&token)
        .await;
    let list: Vec<Value> = resp.json();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["address"], "Jl. Kenanga 3");

    let resp = app
        .server
        .delete(&format!("/customers/{id}"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.json::<Value>()["customerId"], id.as_str());

    let resp = app
        .server
        .get(&format!("/customers/{id}"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 404);
    assert_eq!(resp.json::<Value>()["error"], "Customer not found.");

    let resp = app
        .server
        .delete(&format!("/customers/{id}"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 404);
}

#[tokio::test]
async fn phone_numbers_are_unique() {
    let app = spawn_app();
    let token = staff_token(&app.server).await;
    add_customer(&app.server, &token, "Siti", "0811", None).await;
    let budi = add_customer(&app.server, &token, "Budi", "0812", None).await;

    let resp = app
        .server
        .post("/customers")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Ani", "phoneNumber": "0811", "address": "Jl. Anggrek" }))
        .await;
    assert_eq!(resp.status_code(), 400);
    assert_eq!(
        resp.json::<Value>()["error"],
        "A customer with this phone number already exists."
    );

    let resp = app
        .server
        .put(&format!("/customers/{budi}"))
        .authorization_bearer(&token)
        .json(&json!({ "phoneNumber": "0811" }))
        .await;
    assert_eq!(resp.status_code(), 400);
}

#[tokio::test]
async fn customer_names_and_search() {
    let app = spawn_app();
    let token = staff_token(&app.server).await;

    let resp = app
        .server
        .get("/customers/names")
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 404);

    add_customer(&app.server, &token, "Siti Aminah", "0811", None).await;
    add_customer(&app.server, &token, "Budi", "0822", None).await;

    let resp = app
        .server
        .get("/customers/names")
        .authorization_bearer(&token)
        .await;
    let mut names: Vec<String> = resp.json();
    names.sort();
    assert_eq!(names, vec!["Budi".to_string(), "Siti Aminah".to_string()]);

    let resp = app
        .server
        .get("/customers/search")
        .add_query_param("q", "aminah")
        .authorization_bearer(&token)
        .await;
    let found: Vec<Value> = resp.json();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "Siti Aminah");

    let resp = app
        .server
        .get("/customers/search")
        .add_query_param("q", "0822")
        .authorization_bearer(&token)
        .await;
    let found: Vec<Value> = resp.json();
    assert_eq!(found.len(), 1);

    let resp = app
        .server
        .get("/customers/search")
        .add_query_param("q", "zzz")
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 200);
    assert!(resp.json::<Vec<Value>>().is_empty());

    let resp = app
        .server
        .get("/customers/search")
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 400);
}

#[tokio::test]
async fn waste_type_catalog() {
    let app = spawn_app();
    let token = staff_token(&app.server).await;

    let resp = app
        .server
        .post("/wastetypes")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Plastik" }))
        .await;
    assert_eq!(resp.status_code(), 400);
    assert_eq!(
        resp.json::<Value>()["error"],
        "Both name and price per kg are required."
    );

    let plastik = add_waste_type(&app.server, &token, "Plastik", 3000).await;
    add_waste_type(&app.server, &token, "Kardus", 1500).await;

    let resp = app
        .server
        .post("/wastetypes")
        .authorization_bearer(&token)
        .json(&json!({ "name": "plastik", "pricePerKg": 100 }))
        .await;
    assert_eq!(resp.status_code(), 409);

    let resp = app
        .server
        .post("/wastetypes")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Logam", "pricePerKg": "2000" }))
        .await;
    assert_eq!(resp.status_code(), 201, "{}", resp.text());
    let logam = resp.json::<Value>()["wasteTypeId"]
        .as_str()
        .unwrap()
        .to_string();
    let resp = app
        .server
        .get(&format!("/wastetypes/{logam}"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.json::<Value>()["pricePerKg"], 2000);

    let resp = app
        .server
        .put(&format!("/wastetypes/{plastik}"))
        .authorization_bearer(&token)
        .json(&json!({ "pricePerKg": "free" }))
        .await;
    assert_eq!(resp.status_code(), 400);
    assert_eq!(
        resp.json::<Value>()["error"],
        "Price per kg must be a positive number."
    );

    let resp = app
        .server
        .put(&format!("/wastetypes/{plastik}"))
        .authorization_bearer(&token)
        .json(&json!({ "pricePerKg": 3500 }))
        .await;
    assert_eq!(resp.status_code(), 200);

    let resp = app
        .server
        .get(&format!("/wastetypes/{plastik}"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.json::<Value>()["pricePerKg"], 3500);

    let resp = app
        .server
        .get("/wastetypes/search")
        .add_query_param("q", "kar")
        .authorization_bearer(&token)
        .await;
    let found: Vec<Value> = resp.json();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "Kardus");

    let resp = app
        .server
        .get("/wastetypes")
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.json::<Vec<Value>>().len(), 3);

    let resp = app
        .server
        .delete(&format!("/wastetypes/{plastik}"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 200);

    let resp = app
        .server
        .get(&format!("/wastetypes/{plastik}"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(resp.status_code(), 404);
    assert_eq!(
        resp.json::<Value>()["error"],
        format!("Waste type with ID {plastik} not found.")
    );
}
