//! HTTP endpoints around the gateway
//!
//! Clients discover the websocket URL here, and bots learn how many shards
//! they should open.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use concord_common::{AppError, ErrorResponse};
use concord_core::DomainError;
use serde::Serialize;

use crate::server::GatewayState;
use crate::session::ShardInfo;

/// Error returned by the HTTP endpoints
#[derive(Debug)]
pub struct RouteError(pub AppError);

impl From<AppError> for RouteError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for RouteError {
    fn from(err: DomainError) -> Self {
        Self(AppError::Domain(err))
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "Server error occurred");
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

pub type RouteResult<T> = Result<T, RouteError>;

#[derive(Debug, Serialize)]
pub struct GatewayUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct BotGateway {
    pub url: String,
    pub shards: usize,
}

/// Liveness check
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/gateway
pub async fn get_gateway(State(state): State<GatewayState>) -> RouteResult<Json<GatewayUrl>> {
    if !state.config().gateway.accept_clients {
        return Err(AppError::Unavailable.into());
    }
    Ok(Json(GatewayUrl {
        url: state.config().gateway.advertised_url(),
    }))
}

/// Gateway URL plus the recommended shard count for a bot
///
/// GET /api/gateway/bot
pub async fn get_gateway_bot(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> RouteResult<Json<BotGateway>> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(bare_token)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let user = state
        .users()
        .find_by_token(token)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let guild_count = state.guilds().count_by_user(user.id).await?;

    Ok(Json(BotGateway {
        url: state.config().gateway.advertised_url(),
        shards: ShardInfo::recommended_count(
            guild_count,
            state.config().session.max_guilds_per_shard,
        ),
    }))
}

/// Strip an optional `Bot ` or `Bearer ` scheme
fn bare_token(header: &str) -> &str {
    header
        .strip_prefix("Bot ")
        .or_else(|| header.strip_prefix("Bearer "))
        .unwrap_or(header)
        .trim()
}
