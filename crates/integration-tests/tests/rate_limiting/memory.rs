use std::sync::Arc;

use indoc::indoc;
use integration_tests::{TestServer, summarize};

#[tokio::test]
async fn default_quota_allows_ten_requests() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
    "#};

    let server = TestServer::start(config).await;

    let mut results = Vec::new();

    for _ in 0..12 {
        let response = server.client.get("/dashboard").await;
        results.push(summarize(&response));
    }

    insta::assert_snapshot!(results.join("\n"), @r"
    200 limit=10 remaining=9
    200 limit=10 remaining=8
    200 limit=10 remaining=7
    200 limit=10 remaining=6
    200 limit=10 remaining=5
    200 limit=10 remaining=4
    200 limit=10 remaining=3
    200 limit=10 remaining=2
    200 limit=10 remaining=1
    200 limit=10 remaining=0
    429 limit=- remaining=0
    429 limit=- remaining=0
    ");
}

#[tokio::test]
async fn rejection_body() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 1
        window = "60s"
    "#};

    let server = TestServer::start(config).await;

    assert_eq!(server.client.get("/dashboard").await.status(), 200);

    let response = server.client.get("/dashboard").await;
    assert_eq!(response.status(), 429);

    let body = response.text().await.unwrap();
    insta::assert_snapshot!(body, @"Too Many Requests");
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 1
    "#};

    let server = TestServer::start(config).await;

    for _ in 0..5 {
        let response = server.client.get("/health").await;

        assert_eq!(response.status(), 200);
        assert!(response.headers().get(server::X_RATELIMIT_REMAINING).is_none());
    }

    // Health checks did not consume the dashboard quota.
    assert_eq!(server.client.get("/dashboard").await.status(), 200);
}

#[tokio::test]
async fn forwarded_for_does_not_override_peer_address() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 2

        [server.client_ip]
        trust_forwarded_for = true
    "#};

    let server = TestServer::start(config).await;

    let mut results = Vec::new();

    for forwarded_for in ["198.51.100.1", "198.51.100.2", "198.51.100.3"] {
        let response = server.client.get_forwarded_for("/dashboard", forwarded_for).await;
        results.push(summarize(&response));
    }

    insta::assert_snapshot!(results.join("\n"), @r"
    200 limit=2 remaining=1
    200 limit=2 remaining=0
    429 limit=- remaining=0
    ");
}

#[tokio::test]
async fn window_resets() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 2
        window = "1s"
    "#};

    let server = TestServer::start(config).await;

    for _ in 0..2 {
        assert_eq!(server.client.get("/dashboard").await.status(), 200);
    }

    assert_eq!(server.client.get("/dashboard").await.status(), 429);

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let response = server.client.get("/dashboard").await;
    insta::assert_snapshot!(summarize(&response), @"200 limit=2 remaining=1");
}

#[tokio::test]
async fn concurrent_requests_admit_exactly_the_limit() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 10
    "#};

    let server = Arc::new(TestServer::start(config).await);

    let requests = (0..25).map(|_| {
        let server = server.clone();
        tokio::spawn(async move { server.client.get("/dashboard").await.status().as_u16() })
    });

    let statuses: Vec<u16> = futures::future::join_all(requests)
        .await
        .into_iter()
        .map(|result| result.unwrap())
        .collect();

    assert_eq!(statuses.iter().filter(|status| **status == 200).count(), 10);
    assert_eq!(statuses.iter().filter(|status| **status == 429).count(), 15);
}
