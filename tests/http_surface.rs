//! End-to-end tests of the two routes and their request logs.

use std::collections::HashSet;

use tokio::task::JoinSet;

use loki_request_logger::observability::Level;

mod common;

#[tokio::test]
async fn test_health_returns_healthy() {
    let (logger, hook) = common::recording_logger();
    let server = common::start_server(logger).await;

    let res = common::client().get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Healthy!");

    let requests = hook.matching(Level::Info, "request");
    assert_eq!(requests.len(), 1, "one completion record per request");
    assert_eq!(hook.records().len(), 1, "health handler logs nothing itself");

    let record = &requests[0];
    assert_eq!(record.fields["status"], 200);
    assert_eq!(record.fields["method"], "GET");
    assert_eq!(record.fields["uriPath"], "/");
    assert_eq!(record.fields["protocol"], "HTTP/1.1");
    assert_eq!(record.fields["remoteIP"], "127.0.0.1");
    assert_eq!(record.fields["responseSize"], 8);
    assert!(record.fields["latency"].as_u64().is_some());

    server.stop().await;
}

#[tokio::test]
async fn test_demo_route_logs_domain_error() {
    let (logger, hook) = common::recording_logger();
    let server = common::start_server(logger).await;

    let res = common::client().get(server.url("/test")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Hello, Loki!");

    assert_eq!(hook.matching(Level::Info, "FROM /test").len(), 1);
    let errors = hook.matching(Level::Error, "FROM /test");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].fields["error"],
        "math: square root of negative number -1"
    );

    let requests = hook.matching(Level::Info, "request");
    assert_eq!(requests.len(), 1);
    // The domain error is not a request error.
    assert_eq!(requests[0].fields["error"], serde_json::Value::Null);

    server.stop().await;
}

#[tokio::test]
async fn test_request_metadata_is_captured() {
    let (logger, hook) = common::recording_logger();
    let server = common::start_server(logger).await;

    let res = common::client()
        .get(server.url("/test?source=it"))
        .header("user-agent", "integration-test")
        .header("referer", "http://example.com/")
        .header("x-forwarded-for", "203.0.113.5")
        .header("x-request-id", "fixed-id")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-request-id"], "fixed-id");

    let record = hook.matching(Level::Info, "request").remove(0);
    assert_eq!(record.fields["URI"], "/test?source=it");
    assert_eq!(record.fields["uriPath"], "/test");
    assert_eq!(record.fields["userAgent"], "integration-test");
    assert_eq!(record.fields["Referer"], "http://example.com/");
    assert_eq!(record.fields["remoteIP"], "203.0.113.5");
    assert_eq!(record.fields["requestID"], "fixed-id");
    assert_eq!(record.fields["host"], server.addr.to_string());

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_route_still_logged_once() {
    let (logger, hook) = common::recording_logger();
    let server = common::start_server(logger).await;

    let res = common::client().get(server.url("/nope")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let requests = hook.matching(Level::Info, "request");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].fields["status"], 404);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_logged_independently() {
    const REQUESTS: usize = 100;

    let (logger, hook) = common::recording_logger();
    let server = common::start_server(logger).await;
    let client = common::client();

    let mut tasks = JoinSet::new();
    for i in 0..REQUESTS {
        let client = client.clone();
        let url = server.url(&format!("/test?n={}", i));
        tasks.spawn(async move {
            let res = client
                .get(url)
                .header("user-agent", format!("client-{}", i))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), 200);
            assert_eq!(res.text().await.unwrap(), "Hello, Loki!");
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let requests = hook.matching(Level::Info, "request");
    assert_eq!(requests.len(), REQUESTS);
    assert_eq!(hook.matching(Level::Error, "FROM /test").len(), REQUESTS);
    assert_eq!(hook.matching(Level::Info, "FROM /test").len(), REQUESTS);

    let ids: HashSet<_> = requests
        .iter()
        .map(|r| r.fields["requestID"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), REQUESTS);

    // Each record pairs its own query string with its own user agent.
    for record in &requests {
        let uri = record.fields["URI"].as_str().unwrap();
        let n = uri.trim_start_matches("/test?n=");
        assert_eq!(record.fields["userAgent"], format!("client-{}", n));
    }

    server.stop().await;
}
