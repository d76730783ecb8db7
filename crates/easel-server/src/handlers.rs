//! RPC method handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use easel_core::canvas::StateSnapshot;
use easel_core::ids::SessionId;
use easel_core::messages::ConversationTurn;

use crate::client::{ClientId, ClientRegistry};
use crate::orchestrator::{AgentOrchestrator, StartRequest};
use crate::rpc::{self, RpcResponse};

/// Shared state available to all RPC handlers.
pub struct HandlerState {
    pub orchestrator: Arc<dyn AgentOrchestrator>,
    pub clients: Arc<ClientRegistry>,
}

impl HandlerState {
    pub fn new(orchestrator: Arc<dyn AgentOrchestrator>, clients: Arc<ClientRegistry>) -> Self {
        Self { orchestrator, clients }
    }
}

/// Route one request. `client_id` is the caller, used for subscriptions.
pub fn dispatch(
    state: &HandlerState,
    client_id: &ClientId,
    method: &str,
    params: &Value,
    id: Option<Value>,
) -> RpcResponse {
    match method {
        // Canvas agent
        "canvas.agent.start" => agent_start(state, client_id, params, id),
        "canvas.agent.cancel" => agent_cancel(state, params, id),
        "canvas.state.report" => state_report(state, params, id),
        "canvas.session.state" => session_state(state, params, id),

        // Session
        "session.subscribe" => session_subscribe(state, client_id, params, id),

        // System
        "system.ping" => RpcResponse::success(id, json!({"pong": true})),

        _ => RpcResponse::method_not_found(id, method),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartParams {
    prompt: String,
    #[serde(default)]
    model_id: String,
    provider_id: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    history: Vec<ConversationTurn>,
    #[serde(default)]
    current_nodes: Option<Value>,
    #[serde(default)]
    current_edges: Option<Value>,
}

fn agent_start(state: &HandlerState, client_id: &ClientId, params: &Value, id: Option<Value>) -> RpcResponse {
    let params: StartParams = match rpc::parse_params(params) {
        Ok(p) => p,
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    if params.prompt.trim().is_empty() {
        return RpcResponse::invalid_params(id, "prompt must not be empty");
    }
    if params.provider_id.trim().is_empty() {
        return RpcResponse::invalid_params(id, "providerId must not be empty");
    }

    // Subscribe before the run exists so the caller sees the `session` event.
    let session_id = params
        .session_id
        .filter(|s| !s.trim().is_empty())
        .map(SessionId::from_raw)
        .unwrap_or_default();
    state.clients.subscribe(client_id, session_id.clone());

    let request = StartRequest {
        session_id: Some(session_id),
        prompt: params.prompt,
        model_id: params.model_id,
        provider_ref: params.provider_id,
        history: params.history,
        initial_state: StateSnapshot::from_parts(params.current_nodes, params.current_edges),
    };

    match state.orchestrator.start_session(request) {
        Ok(session_id) => RpcResponse::success(id, json!({"sessionId": session_id})),
        Err(e) => RpcResponse::error(id, rpc::SESSION_BUSY, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportParams {
    session_id: String,
    #[serde(default)]
    nodes: Value,
    #[serde(default)]
    edges: Value,
}

fn state_report(state: &HandlerState, params: &Value, id: Option<Value>) -> RpcResponse {
    let params: ReportParams = match rpc::parse_params(params) {
        Ok(p) => p,
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    let session_id = SessionId::from_raw(params.session_id);
    let accepted = state
        .orchestrator
        .report_state(&session_id, StateSnapshot::new(params.nodes, params.edges));
    RpcResponse::success(id, json!({"accepted": accepted}))
}

fn session_id_param(params: &Value) -> Result<SessionId, String> {
    rpc::require_str(params, "sessionId").map(SessionId::from_raw)
}

fn agent_cancel(state: &HandlerState, params: &Value, id: Option<Value>) -> RpcResponse {
    match session_id_param(params) {
        Ok(session_id) => {
            let cancelled = state.orchestrator.cancel(&session_id);
            RpcResponse::success(id, json!({"cancelled": cancelled}))
        }
        Err(e) => RpcResponse::invalid_params(id, e),
    }
}

fn session_state(state: &HandlerState, params: &Value, id: Option<Value>) -> RpcResponse {
    match session_id_param(params) {
        Ok(session_id) => {
            let phase = state.orchestrator.phase(&session_id);
            RpcResponse::success(id, json!({"phase": phase, "active": phase.is_some()}))
        }
        Err(e) => RpcResponse::invalid_params(id, e),
    }
}

fn session_subscribe(state: &HandlerState, client_id: &ClientId, params: &Value, id: Option<Value>) -> RpcResponse {
    match session_id_param(params) {
        Ok(session_id) => {
            let subscribed = state.clients.subscribe(client_id, session_id);
            RpcResponse::success(id, json!({"subscribed": subscribed}))
        }
        Err(e) => RpcResponse::invalid_params(id, e),
    }
}
