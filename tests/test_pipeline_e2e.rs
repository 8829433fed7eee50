//! Publish -> topic -> consumer -> index -> search, through `LogService`.

use logify::{LogRecord, LogifyError, SearchRequest, TimestampRange};
use serde_json::json;
use std::collections::HashMap;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

mod common;

fn record(level: &str, service: &str, message: &str, timestamp: &str) -> LogRecord {
    LogRecord {
        level: level.to_string(),
        service: service.to_string(),
        message: message.to_string(),
        timestamp: timestamp.to_string(),
        ..Default::default()
    }
}

fn search(tenant: &str, project: &str) -> SearchRequest {
    SearchRequest::default().scoped(tenant, project)
}

#[tokio::test]
async fn test_published_records_become_searchable() {
    let tmp = TempDir::new().unwrap();
    let service = common::open_service(tmp.path());
    let background = service.start(CancellationToken::new());

    for (ts, level, msg) in [
        ("2024-03-01T10:00:00Z", "INFO", "request served"),
        ("2024-03-01T11:00:00Z", "ERROR", "database connection timeout"),
        ("2024-03-01T12:00:00Z", "WARN", "slow query"),
    ] {
        let rec = record(level, "api", msg, ts).scoped("t1", "p1", Some("u1"));
        service.publish(&rec).await.unwrap();
    }
    common::wait_for_indexed(&service, 3).await;

    let hits = service.search(&search("t1", "p1")).await.unwrap();
    assert_eq!(hits.len(), 3);

    // Newest first by default.
    let timestamps: Vec<&str> = hits
        .iter()
        .map(|h| h["timestamp"].as_str().unwrap())
        .collect();
    assert_eq!(
        timestamps,
        vec![
            "2024-03-01T12:00:00Z",
            "2024-03-01T11:00:00Z",
            "2024-03-01T10:00:00Z"
        ]
    );

    for hit in &hits {
        assert!(hit.contains_key("id"));
        assert!(!hit.contains_key("tenant_id"));
        assert!(!hit.contains_key("project_id"));
        assert!(!hit.contains_key("user_id"));
    }

    background.shutdown().await;
}

#[tokio::test]
async fn test_filters_apply_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let service = common::open_service(tmp.path());
    let background = service.start(CancellationToken::new());

    let mut with_region = record("ERROR", "billing", "card declined", "2024-03-02T08:00:00Z");
    with_region.metadata = HashMap::from([("region".to_string(), json!("eu-west"))]);
    for rec in [
        record("ERROR", "api", "database connection timeout", "2024-03-01T10:00:00Z"),
        record("INFO", "api", "database connection restored", "2024-03-01T10:05:00Z"),
        record("ERROR", "worker", "job crashed", "2024-03-03T09:00:00Z"),
        with_region,
    ] {
        service.publish(&rec.scoped("t1", "p1", None)).await.unwrap();
    }
    common::wait_for_indexed(&service, 4).await;

    let req = SearchRequest {
        levels: vec!["ERROR".into()],
        ..search("t1", "p1")
    };
    assert_eq!(service.search(&req).await.unwrap().len(), 3);

    let req = SearchRequest {
        services: vec!["api".into(), "worker".into()],
        levels: vec!["ERROR".into()],
        ..search("t1", "p1")
    };
    assert_eq!(service.search(&req).await.unwrap().len(), 2);

    let req = SearchRequest {
        message_contains: vec!["timeout".into()],
        ..search("t1", "p1")
    };
    let hits = service.search(&req).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["message"], "database connection timeout");

    let req = SearchRequest {
        metadata: HashMap::from([("region".to_string(), json!("eu-west"))]),
        ..search("t1", "p1")
    };
    let hits = service.search(&req).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["service"], "billing");

    let req = SearchRequest {
        timestamp_range: TimestampRange {
            from: "2024-03-01T00:00:00Z".into(),
            to: "2024-03-01T23:59:59Z".into(),
        },
        ..search("t1", "p1")
    };
    assert_eq!(service.search(&req).await.unwrap().len(), 2);

    // Half a range is ignored.
    let req = SearchRequest {
        timestamp_range: TimestampRange {
            from: "2024-03-01T00:00:00Z".into(),
            to: String::new(),
        },
        ..search("t1", "p1")
    };
    assert_eq!(service.search(&req).await.unwrap().len(), 4);

    let req = SearchRequest {
        order: "asc".into(),
        page: 2,
        limit: 2,
        ..search("t1", "p1")
    };
    let hits = service.search(&req).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["timestamp"], "2024-03-02T08:00:00Z");
    assert_eq!(hits[1]["timestamp"], "2024-03-03T09:00:00Z");

    background.shutdown().await;
}

#[tokio::test]
async fn test_tenants_never_see_each_other() {
    let tmp = TempDir::new().unwrap();
    let service = common::open_service(tmp.path());
    let background = service.start(CancellationToken::new());

    service
        .publish(&record("INFO", "api", "tenant one", "").scoped("t1", "p1", None))
        .await
        .unwrap();
    service
        .publish(&record("INFO", "api", "tenant two", "").scoped("t2", "p2", None))
        .await
        .unwrap();
    common::wait_for_indexed(&service, 2).await;

    let hits = service.search(&search("t1", "p1")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["message"], "tenant one");

    let hits = service.search(&search("t2", "p2")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["message"], "tenant two");

    // A tenant guessing another tenant's project id still sees nothing.
    assert!(service.search(&search("t1", "p2")).await.unwrap().is_empty());

    background.shutdown().await;
}

#[tokio::test]
async fn test_search_without_context_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let service = common::open_service(tmp.path());
    let err = service
        .search(&SearchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LogifyError::MissingContext(_)));
}

#[tokio::test]
async fn test_bookmark_is_idempotent_and_scoped() {
    let tmp = TempDir::new().unwrap();
    let service = common::open_service(tmp.path());
    let background = service.start(CancellationToken::new());

    service
        .publish(&record("ERROR", "api", "bookmark me", "").scoped("t1", "p1", None))
        .await
        .unwrap();
    common::wait_for_indexed(&service, 1).await;

    let hits = service.search(&search("t1", "p1")).await.unwrap();
    let id = hits[0]["id"].as_str().unwrap().to_string();

    service.bookmark(&id, "t1", "p1").await.unwrap();
    service.bookmark(&id, "t1", "p1").await.unwrap();

    let hits = service.search(&search("t1", "p1")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["is_bookmarked"], true);
    assert_eq!(hits[0]["message"], "bookmark me");

    let err = service.bookmark(&id, "t2", "p2").await.unwrap_err();
    assert!(matches!(err, LogifyError::DocumentNotFound(_)));

    let err = service.bookmark("no-such-id", "t1", "p1").await.unwrap_err();
    assert!(matches!(err, LogifyError::DocumentNotFound(_)));

    background.shutdown().await;
}

#[tokio::test]
async fn test_service_directory_lists_catalog() {
    let tmp = TempDir::new().unwrap();
    let service = common::open_service(tmp.path());
    let background = service.start(CancellationToken::new());

    for (tenant, project, svc) in [
        ("t1", "p1", "api"),
        ("t1", "p1", "api"),
        ("t1", "p1", "worker"),
        ("t2", "p2", "billing"),
    ] {
        service
            .publish(&record("INFO", svc, "hello", "").scoped(tenant, project, None))
            .await
            .unwrap();
    }
    common::wait_for_indexed(&service, 4).await;

    let mut all = service.list_services().await.unwrap();
    all.sort();
    assert_eq!(all, vec!["api", "billing", "worker"]);

    let mut scoped = service.list_project_services("t1", "p1").await.unwrap();
    scoped.sort();
    assert_eq!(scoped, vec!["api", "worker"]);

    background.shutdown().await;
}

#[tokio::test]
async fn test_restart_resumes_from_committed_offsets() {
    let tmp = TempDir::new().unwrap();

    {
        let service = common::open_service(tmp.path());
        let background = service.start(CancellationToken::new());
        for i in 0..3 {
            let rec = record("INFO", "api", &format!("before restart {}", i), "");
            service.publish(&rec.scoped("t1", "p1", None)).await.unwrap();
        }
        common::wait_for_indexed(&service, 3).await;
        background.shutdown().await;
    }

    // Same broker directory, empty store: only new records are indexed.
    let service = common::open_service(tmp.path());
    let background = service.start(CancellationToken::new());
    service
        .publish(&record("INFO", "api", "after restart", "").scoped("t1", "p1", None))
        .await
        .unwrap();
    common::wait_for_indexed(&service, 1).await;

    let hits = service.search(&search("t1", "p1")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["message"], "after restart");
    assert_eq!(service.stats().records_indexed, 1);

    background.shutdown().await;
}

#[tokio::test]
async fn test_first_record_of_new_project_is_not_lost() {
    let tmp = TempDir::new().unwrap();
    let service = common::open_service(tmp.path());
    let background = service.start(CancellationToken::new());

    // Give the consumer time to settle with no topics.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(service.stats().subscribed_topics, 0);

    let delivery = service
        .publish(&record("INFO", "api", "first ever", "").scoped("t9", "fresh", None))
        .await
        .unwrap();
    assert_eq!(delivery.topic, "logify-fresh");
    assert_eq!(delivery.offset, 0);

    let stats = common::wait_for_indexed(&service, 1).await;
    assert_eq!(stats.subscribed_topics, 1);
    assert_eq!(service.search(&search("t9", "fresh")).await.unwrap().len(), 1);

    background.shutdown().await;
}
