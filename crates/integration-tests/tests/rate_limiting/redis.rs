//! Requires a Redis server at `localhost:6379`. Run with `cargo test -- --ignored`.

use indoc::formatdoc;
use integration_tests::{TestServer, summarize};

fn unique_prefix(name: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis();

    format!("test_{name}_{timestamp}:")
}

#[tokio::test]
#[ignore]
async fn basic_redis_rate_limiting() {
    let config = formatdoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 3
        window = "60s"

        [server.rate_limits.storage]
        type = "redis"
        url = "redis://localhost:6379/0"
        key_prefix = "{prefix}"
    "#, prefix = unique_prefix("basic")};

    let server = TestServer::start(&config).await;

    let mut results = Vec::new();

    for _ in 0..5 {
        let response = server.client.get("/dashboard").await;
        results.push(summarize(&response));
    }

    insta::assert_snapshot!(results.join("\n"), @r"
    200 limit=3 remaining=2
    200 limit=3 remaining=1
    200 limit=3 remaining=0
    429 limit=- remaining=0
    429 limit=- remaining=0
    ");
}

#[tokio::test]
#[ignore]
async fn instances_share_counters() {
    let config = formatdoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 2
        window = "60s"

        [server.rate_limits.storage]
        type = "redis"
        url = "redis://localhost:6379/0"
        key_prefix = "{prefix}"
    "#, prefix = unique_prefix("shared")};

    let first = TestServer::start(&config).await;
    let second = TestServer::start(&config).await;

    assert_eq!(first.client.get("/dashboard").await.status(), 200);
    assert_eq!(second.client.get("/dashboard").await.status(), 200);
    assert_eq!(first.client.get("/dashboard").await.status(), 429);
    assert_eq!(second.client.get("/dashboard").await.status(), 429);
}

#[tokio::test]
#[ignore]
async fn two_step_expiry() {
    let config = formatdoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 1
        window = "1s"

        [server.rate_limits.storage]
        type = "redis"
        url = "redis://localhost:6379/0"
        key_prefix = "{prefix}"
        atomic_expiry = false
    "#, prefix = unique_prefix("two_step")};

    let server = TestServer::start(&config).await;

    assert_eq!(server.client.get("/dashboard").await.status(), 200);
    assert_eq!(server.client.get("/dashboard").await.status(), 429);

    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    assert_eq!(server.client.get("/dashboard").await.status(), 200);
}

#[tokio::test]
async fn unreachable_redis_prevents_startup() {
    let config: config::Config = toml::from_str(indoc::indoc! {r#"
        [server.rate_limits]
        enabled = true

        [server.rate_limits.storage]
        type = "redis"
        url = "redis://127.0.0.1:1/0"
    "#})
    .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listen_address = listener.local_addr().unwrap();
    drop(listener);

    let result = server::serve(server::ServeConfig { listen_address, config }).await;

    let error = result.unwrap_err().to_string();
    assert!(error.starts_with("Failed to initialize rate limiting"), "{error}");
}
