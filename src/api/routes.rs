//! HTTP route handlers: publish, health, stats

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::ChannelName;
use crate::error::Error;

use super::server::SharedState;

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub status: &'static str,
    pub channel: String,
    pub clients_reached: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub channel: Option<String>,
    pub data: Option<Value>,
}

/// `POST /publish/{channel}` — legacy path; body is the event itself.
pub async fn publish_legacy(
    State(state): State<SharedState>,
    Path(channel): Path<String>,
    Json(event): Json<Value>,
) -> Result<Json<PublishResponse>, Error> {
    do_publish(&state, &channel, &event).await
}

/// `POST /publish` — preferred path; body is `{channel, data}`.
pub async fn publish(
    State(state): State<SharedState>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, Error> {
    let channel = req
        .channel
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::PayloadInvalid("Missing 'channel' in request body".to_string()))?;
    let data = req
        .data
        .ok_or_else(|| Error::PayloadInvalid("Missing 'data' in request body".to_string()))?;
    do_publish(&state, &channel, &data).await
}

async fn do_publish(
    state: &SharedState,
    channel: &str,
    event: &Value,
) -> Result<Json<PublishResponse>, Error> {
    if !event.is_object() {
        return Err(Error::PayloadInvalid("Event must be a JSON object".to_string()));
    }

    let parsed = ChannelName::parse(channel)?;
    state.registry.ensure_channel(&parsed).await;

    let sent = crate::broadcast::broadcast(&state.registry, parsed.as_str(), event).await;
    state.stats.record_messages_sent(sent as u64);

    tracing::debug!(channel, clients_reached = sent, "published");

    Ok(Json(PublishResponse {
        status: "published",
        channel: parsed.as_str().to_string(),
        clients_reached: sent,
        timestamp: chrono::Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: f64,
    pub total_clients: usize,
    pub channels: HashMap<String, usize>,
}

/// `GET /health` — simple form (see DESIGN.md for the Open Question on
/// the extended `checks.*` form).
pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let channels = state.registry.get_all_channels().await;
    let total_clients = channels.values().sum();

    Json(HealthResponse {
        status: "healthy",
        uptime_seconds: state.stats.uptime_seconds(),
        total_clients,
        channels,
    })
}

#[derive(Debug, Serialize)]
pub struct ChannelStats {
    pub active_clients: usize,
    pub max_clients: MaxClients,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MaxClients {
    Limited(usize),
    Unlimited(&'static str),
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: f64,
    pub total_connections: u64,
    pub total_messages_sent: u64,
    pub total_messages_received: u64,
    pub active_clients: usize,
    pub channels: HashMap<String, ChannelStats>,
}

/// `GET /stats` — runtime counters, per `broker.py::_get_statistics`.
pub async fn stats(State(state): State<SharedState>) -> impl IntoResponse {
    let snapshot = state.stats.snapshot();
    let counts = state.registry.get_all_channels().await;
    let max_clients = state.config.max_clients_per_channel;

    let channels = counts
        .iter()
        .map(|(name, count)| {
            let max = if max_clients == 0 {
                MaxClients::Unlimited("unlimited")
            } else {
                MaxClients::Limited(max_clients)
            };
            (
                name.clone(),
                ChannelStats {
                    active_clients: *count,
                    max_clients: max,
                },
            )
        })
        .collect();

    Json(StatsResponse {
        uptime_seconds: snapshot.uptime_seconds,
        total_connections: snapshot.total_connections,
        total_messages_sent: snapshot.total_messages_sent,
        total_messages_received: snapshot.total_messages_received,
        active_clients: counts.values().sum(),
        channels,
    })
}
