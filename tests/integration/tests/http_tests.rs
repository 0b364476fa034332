//! HTTP route tests
//!
//! Run with: cargo test -p integration-tests --test http_tests

use integration_tests::{handshake_status, test_config, TestServer, BOB_TOKEN, BOT_TOKEN};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_gateway_url() {
    let mut config = test_config();
    config.gateway.public_url = Some("ws://gateway.example.test".to_string());
    let server = TestServer::start_with_config(config).await.unwrap();

    let response = server.get("/api/gateway").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["url"], "ws://gateway.example.test");
}

#[tokio::test]
async fn test_bot_gateway_accepts_any_token_scheme() {
    let server = TestServer::start().await.unwrap();

    for header in [
        BOT_TOKEN.to_string(),
        format!("Bot {BOT_TOKEN}"),
        format!("Bearer {BOT_TOKEN}"),
    ] {
        let response = server.get_auth("/api/gateway/bot", &header).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["shards"], 1);
        assert!(body["url"].as_str().unwrap().starts_with("ws://"));
    }
}

#[tokio::test]
async fn test_bot_gateway_shard_recommendation() {
    let mut config = test_config();
    config.session.max_guilds_per_shard = 1;
    let server = TestServer::start_with_config(config).await.unwrap();

    // bob is in both fixture guilds
    let response = server.get_auth("/api/gateway/bot", BOB_TOKEN).await.unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["shards"], 2);
}

#[tokio::test]
async fn test_bot_gateway_requires_known_token() {
    let server = TestServer::start().await.unwrap();

    let response = server.get("/api/gateway/bot").await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server.get_auth("/api/gateway/bot", "Bot nope").await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_closed_gateway_refuses_clients() {
    let mut config = test_config();
    config.gateway.accept_clients = false;
    let server = TestServer::start_with_config(config).await.unwrap();

    let response = server.get("/api/gateway").await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let status = handshake_status(&server.ws_url("v=6")).await.unwrap();
    assert_eq!(status, 503);
}

#[tokio::test]
async fn test_handshake_refusals() {
    let server = TestServer::start().await.unwrap();

    assert_eq!(handshake_status(&server.ws_url("v=5")).await.unwrap(), 400);
    assert_eq!(
        handshake_status(&server.ws_url("v=6&encoding=etf")).await.unwrap(),
        400
    );
}
