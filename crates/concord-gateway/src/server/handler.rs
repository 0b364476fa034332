//! WebSocket handler
//!
//! Negotiates the connection parameters, then splits the socket into a
//! writer task draining the connection's outbound queue and a frame stream
//! driving the connection state machine.

use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use concord_common::AppConfig;
use futures::stream::{SplitSink, SplitStream};
use futures::Stream;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::connection::{Connection, ConnectionId, ConnectionSink, OutboundQueue};
use crate::protocol::{Encoding, Frame, GatewayCodec, GatewayMessage};
use crate::server::GatewayState;

/// How long queued envelopes and the close frame may take to flush
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Query parameters of the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    pub v: Option<String>,
    pub encoding: Option<String>,
    /// Accepted for compatibility; transport compression is not offered
    pub compress: Option<String>,
}

impl GatewayQuery {
    /// Resolve the codec for this connection, or the reason to refuse it
    pub fn negotiate(&self, config: &AppConfig) -> Result<GatewayCodec, String> {
        let expected = i64::from(config.gateway.version);
        let version = self
            .v
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(expected);
        if version != expected {
            return Err(format!("Unsupported gateway version {version}"));
        }

        let encoding = match self.encoding.as_deref() {
            None => Encoding::Json,
            Some(raw) => {
                Encoding::from_query(raw).ok_or_else(|| format!("Unsupported encoding {raw}"))?
            }
        };

        Ok(GatewayCodec::new(encoding, config.gateway.max_payload_bytes))
    }
}

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.config().gateway.accept_clients {
        return (StatusCode::SERVICE_UNAVAILABLE, "Gateway is not accepting clients").into_response();
    }

    let codec = match query.negotiate(state.config()) {
        Ok(codec) => codec,
        Err(reason) => {
            tracing::debug!(reason = %reason, "Refusing gateway handshake");
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(state, socket, codec))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket, codec: GatewayCodec) {
    let connection_id = state.next_connection_id();
    let (sink, outbound) =
        ConnectionSink::new(connection_id, state.config().gateway.outbound_buffer);

    tracing::info!(
        connection_id,
        encoding = codec.encoding().as_str(),
        "WebSocket connection established"
    );

    let (ws_sink, ws_stream) = socket.split();
    let writer = tokio::spawn(write_frames(ws_sink, outbound, sink.clone(), codec));

    let connection = Connection::new(state, sink, codec);
    let close = connection.run(inbound_frames(ws_stream, connection_id)).await;

    if let Err(e) = writer.await {
        tracing::warn!(connection_id, error = %e, "Writer task failed");
    }

    tracing::info!(
        connection_id,
        code = close.as_ref().map(|reason| reason.code.as_u16()),
        "WebSocket connection closed"
    );
}

/// Data frames from the socket; ends when the client closes or errors
fn inbound_frames(
    stream: SplitStream<WebSocket>,
    connection_id: ConnectionId,
) -> impl Stream<Item = Frame> + Unpin {
    Box::pin(futures::stream::unfold(stream, move |mut stream| async move {
        loop {
            match stream.next().await? {
                Ok(Message::Text(text)) => return Some((Frame::Text(text), stream)),
                Ok(Message::Binary(bytes)) => return Some((Frame::Binary(bytes), stream)),
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Ok(Message::Close(frame)) => {
                    tracing::debug!(
                        connection_id,
                        code = frame.as_ref().map(|f| f.code),
                        "Client closed connection"
                    );
                    return None;
                }
                Err(e) => {
                    tracing::debug!(connection_id, error = %e, "WebSocket read failed");
                    return None;
                }
            }
        }
    }))
}

/// Drain the outbound queue into the socket
///
/// After a close request, whatever was queued before it is still flushed,
/// followed by the close frame carrying the recorded reason.
async fn write_frames(
    mut ws: SplitSink<WebSocket, Message>,
    mut outbound: OutboundQueue,
    sink: ConnectionSink,
    codec: GatewayCodec,
) {
    loop {
        let message = tokio::select! {
            biased;
            () = sink.closed() => break,
            message = outbound.recv() => message,
        };
        let Some(message) = message else { break };
        if let Err(e) = send_envelope(&mut ws, &codec, &message).await {
            tracing::debug!(connection_id = sink.id(), error = %e, "WebSocket write failed");
            sink.close();
            return;
        }
    }

    let flush = async {
        while let Ok(message) = outbound.try_recv() {
            if send_envelope(&mut ws, &codec, &message).await.is_err() {
                return;
            }
        }
        let frame = sink.kick_reason().map(|reason| CloseFrame {
            code: reason.code.as_u16(),
            reason: reason.reason,
        });
        // the peer may already be gone
        let _ = ws.send(Message::Close(frame)).await;
    };

    if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, flush).await.is_err() {
        tracing::debug!(connection_id = sink.id(), "Timed out flushing before close");
    }
}

async fn send_envelope(
    ws: &mut SplitSink<WebSocket, Message>,
    codec: &GatewayCodec,
    message: &GatewayMessage,
) -> Result<(), axum::Error> {
    let frame = match codec.encode(message) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, event = ?message.t, "Dropping envelope that failed to encode");
            return Ok(());
        }
    };
    let message = match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Binary(bytes) => Message::Binary(bytes),
    };
    ws.send(message).await
}
