use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use config::Config;
use server::ServeConfig;
use tokio::net::TcpListener;
use tokio::time::timeout;

static INIT: Once = Once::new();

fn init_crypto_provider() {
    INIT.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("Failed to install default crypto provider");
    });
}

/// Test client for making HTTP requests to the test server
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    /// Send a GET request with an `X-Forwarded-For` header
    pub async fn get_forwarded_for(&self, path: &str, forwarded_for: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Forwarded-For", forwarded_for)
            .send()
            .await
            .unwrap()
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with the given TOML configuration
    pub async fn start(config_toml: &str) -> Self {
        init_crypto_provider();

        let config: Config = toml::from_str(config_toml).unwrap();
        config.validate().unwrap();

        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            // Drop the listener so the server can bind to the address
            drop(listener);

            let _ = tx.send(server::serve(serve_config).await);
        });

        let client = TestClient::new(format!("http://{address}"));

        // Any answer means the listener is up, even a 404 from a disabled health route.
        let ready = wait_until_ready(&format!("http://{address}/health"), Duration::from_secs(5)).await;

        if let Ok(Err(e)) = rx.try_recv() {
            eprintln!("Server failed to start: {e}");
            std::process::exit(1);
        }

        assert!(ready, "server at {address} did not start accepting requests");

        TestServer {
            client,
            address,
            _handle: handle,
        }
    }
}

/// Polls `url` until the server answers, giving up after `deadline`. Returns whether it answered.
pub async fn wait_until_ready(url: &str, deadline: Duration) -> bool {
    let client = reqwest::Client::new();

    let poll = async {
        while client.get(url).send().await.is_err() {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    };

    timeout(deadline, poll).await.is_ok()
}

/// Status and rate limit headers of a response, for compact snapshots.
pub fn summarize(response: &reqwest::Response) -> String {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .map(|value| value.to_str().unwrap_or("invalid").to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    format!(
        "{} limit={} remaining={}",
        response.status().as_u16(),
        header(server::X_RATELIMIT_LIMIT),
        header(server::X_RATELIMIT_REMAINING)
    )
}
