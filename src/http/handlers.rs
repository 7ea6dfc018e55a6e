//! Node-facing sync and event endpoints.

use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::compose::ComposedConfig;
use crate::http::response::{ApiError, ApiResult};
use crate::http::server::AppState;
use crate::messaging::HttpFirewallEvent;
use crate::model::EntityKind;
use crate::store::NodeVersion;
use crate::sync::{NodeSnapshot, PendingScope};

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub scope: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingResponse {
    pub scope: PendingScope,
    pub ids: BTreeSet<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AckRequest {
    pub version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub version: u64,
    pub applied: u64,
    pub pending: bool,
}

impl From<NodeVersion> for AckResponse {
    fn from(v: NodeVersion) -> Self {
        Self {
            version: v.version,
            applied: v.applied,
            pending: v.is_pending(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallEventRequest {
    pub node_id: i64,
    #[serde(flatten)]
    pub event: HttpFirewallEvent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallEventResponse {
    pub task_id: Option<i64>,
}

pub async fn list_pending(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<PendingResponse>> {
    let scope = match query.scope.as_deref() {
        Some(s) => s.parse::<PendingScope>().map_err(ApiError::bad_request)?,
        None => PendingScope::default(),
    };
    let ids = state.components.gateway.list_pending(scope).await?;
    Ok(Json(PendingResponse { scope, ids }))
}

pub async fn fetch_config(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<ComposedConfig>> {
    let kind = kind.parse::<EntityKind>().map_err(|e| ApiError::bad_request(e.to_string()))?;
    match state.components.gateway.fetch(kind, id).await? {
        Some(config) => Ok(Json(config)),
        None => Err(ApiError::not_found(kind, id)),
    }
}

pub async fn fetch_node_config(
    State(state): State<AppState>,
    Path(node_id): Path<i64>,
) -> ApiResult<Json<NodeSnapshot>> {
    match state.components.gateway.fetch_node(node_id).await? {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(ApiError::not_found(EntityKind::Node, node_id)),
    }
}

pub async fn ack_node(
    State(state): State<AppState>,
    Path(node_id): Path<i64>,
    Json(body): Json<AckRequest>,
) -> ApiResult<Json<AckResponse>> {
    let acked = state.components.gateway.ack_node(node_id, body.version).await?;
    Ok(Json(acked.into()))
}

pub async fn firewall_event(
    State(state): State<AppState>,
    Json(body): Json<FirewallEventRequest>,
) -> ApiResult<Json<FirewallEventResponse>> {
    let task_id = state
        .components
        .firewall
        .notify_http_firewall_event(body.node_id, &body.event)
        .await?;
    Ok(Json(FirewallEventResponse { task_id }))
}

pub async fn healthz() -> &'static str {
    "ok"
}
