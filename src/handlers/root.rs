use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Welcome to the CipherChat relay 👋
Version: {version}

Available endpoints:
  - POST /api/register                              - Register a username and P-256 public key
  - GET  /api/nonce?username=                       - Fetch a login challenge
  - POST /api/login                                 - Answer the challenge with a signature
  - GET  /api/refresh                               - New access token from the refresh cookie
  - GET  /api/ws/chat                               - Realtime chat WebSocket
  - POST /api/protected/logout                      - End the current session
  - GET  /api/protected/me                          - Current identity
  - GET  /api/protected/history/{{username}}          - Messages with a peer
  - GET  /api/protected/users/{{username}}/public-key - A peer's public key
  - GET  /api/protected/friends                     - Friend list (POST to add)
  - GET  /health                                    - Light health check
  - GET  /health?mode=full                          - Full health check (includes storage)
  - GET  /metrics                                   - Prometheus metrics

Message bodies are end-to-end encrypted; this server only stores and relays ciphertext.
"#
    )
}
