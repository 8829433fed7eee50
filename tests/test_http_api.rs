//! HTTP surface: caller context, envelopes and status codes.

use reqwest::Client;
use serde_json::{json, Value};

mod common;

fn with_context(
    builder: reqwest::RequestBuilder,
    tenant: &str,
    project: &str,
) -> reqwest::RequestBuilder {
    builder
        .header("x-tenant-id", tenant)
        .header("x-project-id", project)
        .header("x-user-id", "u1")
}

async fn create_log(
    client: &Client,
    addr: &str,
    tenant: &str,
    project: &str,
    body: Value,
) -> reqwest::Response {
    with_context(client.post(format!("{}/v1/logs", addr)), tenant, project)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn search(client: &Client, addr: &str, tenant: &str, project: &str, body: Value) -> Value {
    let resp = with_context(client.post(format!("{}/v1/logs/search", addr)), tenant, project)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_create_and_search_round_trip() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let resp = create_log(
        &client,
        &server.addr,
        "t1",
        "p1",
        json!({
            "level": "ERROR",
            "message": "database connection timeout",
            "service": "api",
            "metadata": {"region": "eu-west"},
            "timestamp": "2025-01-07T09:00:00Z"
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({"message": "log created successfully", "status_code": 200})
    );

    common::wait_for_indexed(&server.service, 1).await;

    let body = search(&client, &server.addr, "t1", "p1", json!({"levels": ["ERROR"]})).await;
    assert_eq!(body["message"], "Get log");
    assert_eq!(body["status_code"], 200);
    let logs = body["data"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["message"], "database connection timeout");
    assert_eq!(logs[0]["metadata"]["region"], "eu-west");
    assert!(logs[0]["id"].is_string());
    assert!(logs[0].get("tenant_id").is_none());
    assert!(logs[0].get("user_id").is_none());
}

#[tokio::test]
async fn test_body_cannot_override_caller_context() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let resp = create_log(
        &client,
        &server.addr,
        "t1",
        "p1",
        json!({"tenant_id": "t2", "project_id": "p2", "message": "spoofed", "service": "api"}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    common::wait_for_indexed(&server.service, 1).await;

    let mine = search(&client, &server.addr, "t1", "p1", json!({})).await;
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);

    // Search bodies are rescoped the same way.
    let theirs = search(
        &client,
        &server.addr,
        "t2",
        "p2",
        json!({"tenant_id": "t1", "project_id": "p1"}),
    )
    .await;
    assert!(theirs["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_context_is_unauthorized() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let resp = client
        .post(format!("{}/v1/logs", server.addr))
        .json(&json!({"message": "who am i"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "unauthorized");
    assert_eq!(body["status_code"], 401);
    assert_eq!(body["errors"]["error"], "missing_context");
    assert!(body["errors"]["request_id"]
        .as_str()
        .unwrap()
        .starts_with("req_lg_"));

    let resp = client
        .post(format!("{}/v1/logs/search", server.addr))
        .header("x-tenant-id", "t1")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/v1/bookmarks", server.addr))
        .header("x-tenant-id", "  ")
        .header("x-project-id", "p1")
        .json(&json!({"log_id": "abc"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let resp = with_context(client.post(format!("{}/v1/logs", server.addr)), "t1", "p1")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "invalid request");
    assert_eq!(body["errors"]["error"], "invalid_request");
}

#[tokio::test]
async fn test_nested_metadata_filter_is_bad_request() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let resp = with_context(
        client.post(format!("{}/v1/logs/search", server.addr)),
        "t1",
        "p1",
    )
    .json(&json!({"metadata": {"request": {"path": "/login"}}}))
    .send()
    .await
    .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errors"]["error"], "invalid_request");
    assert!(body["errors"]["detail"]
        .as_str()
        .unwrap()
        .contains("'request'"));
}

#[tokio::test]
async fn test_missing_content_type_defaults_to_json() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let resp = with_context(client.post(format!("{}/v1/logs", server.addr)), "t1", "p1")
        .body(r#"{"message": "shipped without headers", "service": "agent"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_bookmark_endpoint() {
    let server = common::spawn_server().await;
    let client = Client::new();

    create_log(
        &client,
        &server.addr,
        "t1",
        "p1",
        json!({"message": "keep this one", "service": "api"}),
    )
    .await;
    common::wait_for_indexed(&server.service, 1).await;

    let found = search(&client, &server.addr, "t1", "p1", json!({})).await;
    let id = found["data"][0]["id"].as_str().unwrap().to_string();

    let resp = with_context(client.post(format!("{}/v1/bookmarks", server.addr)), "t1", "p1")
        .json(&json!({"log_id": id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({"data": "Bookmark added successfully", "status_code": 200})
    );

    let found = search(&client, &server.addr, "t1", "p1", json!({})).await;
    assert_eq!(found["data"][0]["is_bookmarked"], true);

    // Another tenant cannot bookmark it, and cannot tell it exists.
    let resp = with_context(client.post(format!("{}/v1/bookmarks", server.addr)), "t2", "p2")
        .json(&json!({"log_id": id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "log not found");

    let resp = with_context(client.post(format!("{}/v1/bookmarks", server.addr)), "t1", "p1")
        .json(&json!({"log_id": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_services_listing() {
    let server = common::spawn_server().await;
    let client = Client::new();

    for (tenant, project, service) in [
        ("t1", "p1", "api"),
        ("t1", "p1", "worker"),
        ("t2", "p2", "billing"),
    ] {
        let resp = create_log(
            &client,
            &server.addr,
            tenant,
            project,
            json!({"message": "hello", "service": service}),
        )
        .await;
        assert_eq!(resp.status(), 200);
    }
    common::wait_for_indexed(&server.service, 3).await;

    let body: Value = client
        .get(format!("{}/v1/logs/services", server.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "Get log");
    let mut all: Vec<String> = serde_json::from_value(body["data"].clone()).unwrap();
    all.sort();
    assert_eq!(all, vec!["api", "billing", "worker"]);

    let body: Value = with_context(
        client.get(format!("{}/v1/logs/services?scope=project", server.addr)),
        "t1",
        "p1",
    )
    .send()
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    let mut scoped: Vec<String> = serde_json::from_value(body["data"].clone()).unwrap();
    scoped.sort();
    assert_eq!(scoped, vec!["api", "worker"]);

    let resp = client
        .get(format!("{}/v1/logs/services?scope=project", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/v1/logs/services?scope=galaxy", server.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_health_reports_consumer_stats() {
    let server = common::spawn_server().await;
    let client = Client::new();

    create_log(&client, &server.addr, "t1", "p1", json!({"message": "tick"})).await;
    common::wait_for_indexed(&server.service, 1).await;

    let body: Value = client
        .get(format!("{}/health", server.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["node_id"].is_string());
    assert_eq!(body["store"], "memory");
    assert_eq!(body["consumer"]["records_indexed"], 1);
    assert_eq!(body["consumer"]["subscribed_topics"], 1);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let server = common::spawn_server().await;
    let body: Value = Client::new()
        .get(format!("{}/api-docs/openapi.json", server.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["info"]["title"], "Logify API");
    assert!(body["paths"]["/v1/logs/search"].is_object());
}
