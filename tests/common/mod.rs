// Test helpers are intentionally partially used
#![allow(dead_code)]

use cipherchat::{
    create_router_with_config, AppConfig, AuthConfig, CookieConfig, MetricsType, ServerConfig,
    StorageConfig,
};
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey};
use rand::rngs::OsRng;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use sha3::{Digest, Sha3_256};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;

static USER_SEQ: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Test Setup
// ============================================================================

/// Configuration for a self-contained server: in-memory storage, plain-HTTP
/// cookies, no external services.
pub fn memory_config(metrics: MetricsType) -> AppConfig {
    // ---
    AppConfig {
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            trust_proxy_headers: false,
        },
        storage: StorageConfig::Memory,
        auth: AuthConfig::new(
            "test-access-secret".to_string(),
            "test-refresh-secret".to_string(),
            Duration::from_secs(3600),
            false,
        )
        .expect("valid auth config"),
        cookie: CookieConfig {
            secure: false,
            domain: None,
        },
        metrics,
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
}

impl TestServer {
    // ---
    pub async fn new() -> Self {
        // ---
        Self::with_config(memory_config(MetricsType::Noop)).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        // ---
        // Enable debug logging only when requested
        if std::env::var("TEST_DEBUG").is_ok() {
            std::env::set_var("RUST_LOG", "debug");
            std::env::set_var("NO_COLOR", "1");
        }

        let app = create_router_with_config(config)
            .await
            .expect("Should be able to create router");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Spawn the server in the background
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        // Give the server a moment to start
        sleep(Duration::from_millis(100)).await;

        let client = Client::new();

        Self { addr, client }
    }

    pub fn url(&self, path: &str) -> String {
        // ---
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        // ---
        format!("ws://{}/api/ws/chat?token={}", self.addr, token)
    }
}

// ============================================================================
// Client-side identity
// ============================================================================

/// A chat user holding its own P-256 key pair, as a real client would.
pub struct TestUser {
    pub username: String,
    pub key: SigningKey,
}

impl TestUser {
    // ---
    /// Fresh key pair and a username unique within this test binary.
    pub fn new(prefix: &str) -> Self {
        // ---
        let seq = USER_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            username: format!("{prefix}_{}_{seq}", std::process::id()),
            key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn public_key_json(&self) -> Value {
        // ---
        let point = self.key.verifying_key().to_encoded_point(false);
        json!({
            "x": hex::encode(point.x().unwrap()),
            "y": hex::encode(point.y().unwrap()),
        })
    }

    /// Signs SHA3-256 of the hex-decoded challenge bytes.
    pub fn sign_challenge(&self, nonce: &str) -> Value {
        // ---
        let digest = Sha3_256::digest(hex::decode(nonce).unwrap());
        let signature: Signature = self.key.sign_prehash(&digest).unwrap();
        let (r, s) = signature.split_bytes();
        json!({ "r": hex::encode(r), "s": hex::encode(s) })
    }

    pub async fn register(&self, server: &TestServer) -> Response {
        // ---
        server
            .client
            .post(server.url("/api/register"))
            .json(&json!({
                "username": self.username,
                "publicKeyHex": self.public_key_json(),
            }))
            .send()
            .await
            .unwrap()
    }

    pub async fn fetch_nonce(&self, server: &TestServer) -> String {
        // ---
        let res = server
            .client
            .get(server.url("/api/nonce"))
            .query(&[("username", self.username.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = res.json().await.unwrap();
        body["data"]["nonce"].as_str().unwrap().to_string()
    }

    pub async fn submit_login(&self, server: &TestServer, signature: Value) -> Response {
        // ---
        server
            .client
            .post(server.url("/api/login"))
            .json(&json!({ "username": self.username, "signature": signature }))
            .send()
            .await
            .unwrap()
    }

    /// Register, answer a challenge and return the new session.
    pub async fn sign_up_and_login(&self, server: &TestServer) -> LoggedIn {
        // ---
        assert_eq!(self.register(server).await.status(), StatusCode::CREATED);
        self.login(server).await
    }

    pub async fn login(&self, server: &TestServer) -> LoggedIn {
        // ---
        let nonce = self.fetch_nonce(server).await;
        let res = self
            .submit_login(server, self.sign_challenge(&nonce))
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let refresh_cookie = refresh_cookie_from(&res).expect("login sets the refresh cookie");
        let body: Value = res.json().await.unwrap();

        LoggedIn {
            access_token: body["data"]["access_token"].as_str().unwrap().to_string(),
            refresh_cookie,
        }
    }
}

/// Tokens held by a logged-in client.
pub struct LoggedIn {
    pub access_token: String,
    /// `refresh_token=<value>`, ready for a `Cookie` header.
    pub refresh_cookie: String,
}

/// The `name=value` pair of the `refresh_token` Set-Cookie header, if any.
pub fn refresh_cookie_from(res: &Response) -> Option<String> {
    // ---
    set_cookie_header(res).map(|header| header.split(';').next().unwrap_or("").trim().to_string())
}

/// The full `refresh_token` Set-Cookie header, attributes included.
pub fn set_cookie_header(res: &Response) -> Option<String> {
    // ---
    res.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("refresh_token="))
        .map(str::to_string)
}
