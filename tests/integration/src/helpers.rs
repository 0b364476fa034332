//! Test helpers for integration tests
//!
//! Provides a gateway server on an ephemeral port backed by the development
//! fixture, plus a minimal websocket client speaking JSON or MessagePack.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use concord_common::AppConfig;
use concord_gateway::server::{bind, serve, GatewayState};
use concord_store::MemoryStore;
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;

/// How long a client waits for the next frame
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";
pub const BOT_TOKEN: &str = "helper-bot-token";
pub const LOUNGE_ID: &str = "200000000000000001";

/// Path of the development fixture shipped with the workspace
pub fn fixture_path() -> String {
    format!("{}/../../fixtures/dev.json", env!("CARGO_MANIFEST_DIR"))
}

/// Defaults suitable for tests: fixture store, generous identify bucket
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.rate_limit.identify.limit = 100;
    config.store.fixture_path = Some(fixture_path());
    config
}

/// Gateway instance that shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: GatewayState,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config()).await
    }

    /// Start a test server with custom config
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let store = match &config.store.fixture_path {
            Some(path) => MemoryStore::from_fixture_file(path).await?,
            None => MemoryStore::new(),
        };
        let state = GatewayState::new(config, Arc::new(store));

        let listener = bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        tokio::spawn(serve(listener, state.clone(), shutdown.clone()));

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            state,
            shutdown,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Websocket URL with the given query string
    pub fn ws_url(&self, query: &str) -> String {
        if query.is_empty() {
            format!("ws://{}/gateway", self.addr)
        } else {
            format!("ws://{}/gateway?{query}", self.addr)
        }
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a GET request with a raw Authorization header
    pub async fn get_auth(&self, path: &str, authorization: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .header("Authorization", authorization)
            .send()
            .await?)
    }

    /// Open a JSON gateway connection and consume HELLO
    pub async fn connect(&self) -> Result<GatewayClient> {
        GatewayClient::connect(&self.ws_url("v=6&encoding=json"), false).await
    }

    /// Open a gateway connection, identify, and return it with READY
    pub async fn identify(&self, token: &str) -> Result<(GatewayClient, Value)> {
        let mut client = self.connect().await?;
        client
            .send(2, json!({"token": token, "properties": {"$os": "linux"}}))
            .await?;
        let ready = client.expect_event("READY").await?;
        Ok((client, ready))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// What the server sent next
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Message(Value),
    /// Close frame code, `None` if the socket ended without one
    Closed(Option<u16>),
}

/// Minimal gateway client
pub struct GatewayClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    msgpack: bool,
    /// HELLO as received on connect
    pub hello: Value,
}

impl GatewayClient {
    /// Connect and wait for HELLO
    pub async fn connect(url: &str, msgpack: bool) -> Result<Self> {
        let (ws, _) = connect_async(url).await?;
        let mut client = Self {
            ws,
            msgpack,
            hello: Value::Null,
        };
        match client.recv().await? {
            Incoming::Message(hello) if hello["op"] == 10 => client.hello = hello,
            other => bail!("expected HELLO, got {other:?}"),
        }
        Ok(client)
    }

    /// Send an envelope with the negotiated encoding
    pub async fn send(&mut self, op: u8, d: Value) -> Result<()> {
        let envelope = json!({"op": op, "d": d});
        let message = if self.msgpack {
            Message::Binary(rmp_serde::to_vec_named(&envelope)?)
        } else {
            Message::Text(envelope.to_string())
        };
        self.ws.send(message).await?;
        Ok(())
    }

    /// Send a raw text frame
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Next envelope or close
    pub async fn recv(&mut self) -> Result<Incoming> {
        loop {
            let next = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for the gateway")?;
            match next {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Incoming::Message(serde_json::from_str(&text)?))
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Incoming::Message(rmp_serde::from_slice(&bytes)?))
                }
                Some(Ok(Message::Close(frame))) => {
                    return Ok(Incoming::Closed(frame.map(|f| u16::from(f.code))))
                }
                Some(Ok(_)) => {}
                Some(Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                ))
                | None => return Ok(Incoming::Closed(None)),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Next envelope; fails on close
    pub async fn expect_message(&mut self) -> Result<Value> {
        match self.recv().await? {
            Incoming::Message(message) => Ok(message),
            Incoming::Closed(code) => bail!("connection closed with {code:?}"),
        }
    }

    /// Next envelope, which must be the named dispatch
    pub async fn expect_event(&mut self, name: &str) -> Result<Value> {
        let message = self.expect_message().await?;
        if message["op"] != 0 || message["t"] != name {
            bail!("expected {name}, got {message}");
        }
        Ok(message)
    }

    /// Skip envelopes until the connection closes; returns the close code
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            if let Incoming::Closed(code) = self.recv().await? {
                return Ok(code);
            }
        }
    }

    /// Close from the client side
    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Status code of a refused handshake
pub async fn handshake_status(url: &str) -> Result<u16> {
    match connect_async(url).await {
        Ok(_) => bail!("handshake unexpectedly succeeded"),
        Err(tungstenite::Error::Http(response)) => Ok(response.status().as_u16()),
        Err(e) => Err(e.into()),
    }
}
