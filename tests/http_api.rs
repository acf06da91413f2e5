//! HTTP surface over the in-memory gateway: status codes and envelopes.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use warehouse_api::{builtin_catalog, resolve, routes, AppState, MemoryGateway};

fn test_app() -> Router {
    let model = Arc::new(resolve(&builtin_catalog().unwrap()).unwrap());
    let gateway = Arc::new(MemoryGateway::new(model.clone()));
    routes::app(AppState::new(gateway, model), 64 * 1024)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn locality() -> Value {
    json!({
        "id": "6700",
        "locality_name": "Gonnet",
        "province_name": "Buenos Aires",
        "country_name": "Argentina"
    })
}

fn seller(cid: i64) -> Value {
    json!({
        "cid": cid,
        "company_name": "Meli",
        "address": "Calle 1",
        "telephone": "221-555-0100",
        "locality_id": "6700"
    })
}

#[tokio::test]
async fn health_and_version_respond() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "ok");

    let (status, body) = send(&app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "warehouse-api");
    assert_eq!(body["resources"], 13);
}

#[tokio::test]
async fn seller_lifecycle() {
    let app = test_app();
    let (status, _) = send(&app, "POST", "/api/v1/localities", Some(locality())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/api/v1/sellers", Some(seller(1))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["company_name"], "Meli");

    let (status, body) = send(&app, "GET", "/api/v1/sellers/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cid"], 1);

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/sellers/1",
        Some(json!({ "telephone": "221-555-0199" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["telephone"], "221-555-0199");
    assert_eq!(body["data"]["address"], "Calle 1");

    let (status, body) = send(&app, "GET", "/api/v1/sellers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);

    let (status, body) = send(&app, "DELETE", "/api/v1/sellers/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, "GET", "/api/v1/sellers/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn invalid_body_is_unprocessable() {
    let app = test_app();
    let mut body = seller(1);
    body.as_object_mut().unwrap().remove("company_name");
    let (status, body) = send(&app, "POST", "/api/v1/sellers", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["message"], "validation: company_name is required");
}

#[tokio::test]
async fn conflicts_carry_details() {
    let app = test_app();
    send(&app, "POST", "/api/v1/localities", Some(locality())).await;
    send(&app, "POST", "/api/v1/sellers", Some(seller(1))).await;

    let (status, body) = send(&app, "POST", "/api/v1/sellers", Some(seller(1))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
    assert_eq!(body["error"]["details"]["field"], "cid");

    let mut orphan = seller(2);
    orphan["locality_id"] = json!("1234");
    let (status, body) = send(&app, "POST", "/api/v1/sellers", Some(orphan)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "referenced_entity_not_found");
    assert_eq!(body["error"]["details"]["column"], "locality_id");
    assert_eq!(body["error"]["details"]["entity"], "localities");

    let (status, body) = send(&app, "PATCH", "/api/v1/sellers/1", Some(json!({ "id": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "identity_immutable");
}

#[tokio::test]
async fn bad_paths_and_ids() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/v1/spaceships", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(&app, "GET", "/api/v1/sellers/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = send(&app, "DELETE", "/api/v1/warehouses/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/api/v1/warehouses", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_endpoint_in_both_modes() {
    let app = test_app();
    send(&app, "POST", "/api/v1/localities", Some(locality())).await;
    send(&app, "POST", "/api/v1/sellers", Some(seller(1))).await;

    let (status, body) = send(&app, "GET", "/api/v1/localities/reports/sellers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["sellers_count"], 1);

    let (status, body) = send(&app, "GET", "/api/v1/localities/reports/sellers?id=6700", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["locality_name"], "Gonnet");

    let (status, _) = send(&app, "GET", "/api/v1/localities/reports/sellers?id=9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/v1/localities/reports/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn send_raw(app: &Router, uri: &str, content_type: Option<&str>, body: &str) -> (StatusCode, Value) {
    let mut req = Request::builder().method("POST").uri(uri);
    if let Some(ct) = content_type {
        req = req.header("content-type", ct);
    }
    let resp = app
        .clone()
        .oneshot(req.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn unreadable_bodies_use_the_error_envelope() {
    let app = test_app();
    let (status, body) = send_raw(&app, "/api/v1/sellers", Some("application/json"), r#"{"cid": 1,"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send_raw(&app, "/api/v1/sellers", None, r#"{"cid": 1}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("Content-Type"));
}

#[tokio::test]
async fn null_identity_in_patch_is_ignored() {
    let app = test_app();
    send(&app, "POST", "/api/v1/warehouses", Some(json!({
        "address": "Ruta 2 km 40",
        "telephone": "221-555-0200",
        "warehouse_code": "W-1",
        "minimum_capacity": 10,
        "minimum_temperature": -5
    })))
    .await;
    let (status, body) = send(
        &app,
        "PATCH",
        "/api/v1/warehouses/1",
        Some(json!({ "id": null, "minimum_temperature": -5.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["minimum_temperature"], -5.5);
}
