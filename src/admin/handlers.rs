use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::admin::mutations::MutationOutcome;
use crate::health::NodeHealthResult;
use crate::http::response::{ApiError, ApiResult};
use crate::http::server::AppState;
use crate::messaging::MessageTask;
use crate::model::{Cluster, EntityKind, Node, Origin, ProxyProtocol, ReverseProxy, ReverseProxyRef, Server, ServerGroup};
use crate::propagation::NotifyReport;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub pending_nodes: usize,
}

/// Body of a group reverse-proxy update. A missing or null reference clears it.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReverseProxyRequest {
    #[serde(default)]
    pub reverse_proxy_ref: Option<ReverseProxyRef>,
}

/// Body of a group reorder: ids from highest to lowest order.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOrdersRequest {
    pub group_ids: Vec<i64>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    pub cluster_id: i64,
    pub results: Vec<NodeHealthResult>,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<SystemStatus>> {
    let pending = state.components.store.find_pending_node_ids().await.map_err(crate::error::EdgeError::from)?;
    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        pending_nodes: pending.len(),
    }))
}

pub async fn save_cluster(State(state): State<AppState>, Json(body): Json<Cluster>) -> ApiResult<Json<MutationOutcome>> {
    Ok(Json(state.components.mutations.save_cluster(body).await?))
}

pub async fn save_node(State(state): State<AppState>, Json(body): Json<Node>) -> ApiResult<Json<MutationOutcome>> {
    Ok(Json(state.components.mutations.save_node(body).await?))
}

pub async fn save_server(State(state): State<AppState>, Json(body): Json<Server>) -> ApiResult<Json<MutationOutcome>> {
    Ok(Json(state.components.mutations.save_server(body).await?))
}

pub async fn save_group(
    State(state): State<AppState>,
    Json(body): Json<ServerGroup>,
) -> ApiResult<Json<MutationOutcome>> {
    Ok(Json(state.components.mutations.save_group(body).await?))
}

pub async fn save_reverse_proxy(
    State(state): State<AppState>,
    Json(body): Json<ReverseProxy>,
) -> ApiResult<Json<MutationOutcome>> {
    Ok(Json(state.components.mutations.save_reverse_proxy(body).await?))
}

pub async fn save_origin(State(state): State<AppState>, Json(body): Json<Origin>) -> ApiResult<Json<MutationOutcome>> {
    Ok(Json(state.components.mutations.save_origin(body).await?))
}

pub async fn update_group_reverse_proxy(
    State(state): State<AppState>,
    Path((group_id, protocol)): Path<(i64, String)>,
    Json(body): Json<GroupReverseProxyRequest>,
) -> ApiResult<Json<MutationOutcome>> {
    let protocol: ProxyProtocol = protocol.parse().map_err(ApiError::bad_request)?;
    let outcome = state
        .components
        .mutations
        .update_group_reverse_proxy(group_id, protocol, body.reverse_proxy_ref)
        .await?;
    Ok(Json(outcome))
}

pub async fn update_group_orders(
    State(state): State<AppState>,
    Json(body): Json<GroupOrdersRequest>,
) -> ApiResult<Json<NotifyReport>> {
    Ok(Json(state.components.mutations.update_group_orders(&body.group_ids).await?))
}

pub async fn disable(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<MutationOutcome>> {
    set_state(state, &kind, id, false).await
}

pub async fn enable(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<MutationOutcome>> {
    set_state(state, &kind, id, true).await
}

async fn set_state(state: AppState, kind: &str, id: i64, enabled: bool) -> ApiResult<Json<MutationOutcome>> {
    let kind = kind.parse::<EntityKind>().map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(state.components.mutations.set_state(kind, id, enabled).await?))
}

pub async fn execute_health_check(
    State(state): State<AppState>,
    Path(cluster_id): Path<i64>,
) -> ApiResult<Json<HealthCheckResponse>> {
    let results = state.components.health.run(cluster_id).await?;
    Ok(Json(HealthCheckResponse { cluster_id, results }))
}

pub async fn list_messages(State(state): State<AppState>) -> ApiResult<Json<Vec<MessageTask>>> {
    let tasks = state
        .components
        .messages
        .list_message_tasks()
        .await
        .map_err(crate::error::EdgeError::from)?;
    Ok(Json(tasks))
}
