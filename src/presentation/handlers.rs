// HTTP request handlers
use crate::application::error::PidTuneError;
use crate::application::temperature_ingest::CurrentData;
use crate::domain::heater::HeaterId;
use crate::infrastructure::api_response::ApiResponse;
use crate::infrastructure::event_stream::sse_from_receiver;
use crate::presentation::app_state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct LineHook {
    pub line: String,
}

#[derive(Deserialize)]
pub struct CommandHook {
    pub command: String,
}

#[derive(Serialize)]
pub struct QueueingResponse {
    pub commands: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct ApiCommand {
    pub command: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub tool: Option<HeaterId>,
}

#[derive(Deserialize)]
struct AutotuneRequest {
    heater: String,
    target: i64,
    cycles: u32,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Line received from the controller
pub async fn line_received(
    State(state): State<Arc<AppState>>,
    Json(hook): Json<LineHook>,
) -> StatusCode {
    state.service.on_line_received(&hook.line).await;
    StatusCode::OK
}

/// Command sent to the controller
pub async fn command_sent(
    State(state): State<Arc<AppState>>,
    Json(hook): Json<CommandHook>,
) -> StatusCode {
    state.service.on_command_sent(&hook.command).await;
    StatusCode::OK
}

/// Command about to be queued; may be rewritten
pub async fn command_queueing(
    State(state): State<Arc<AppState>>,
    Json(hook): Json<CommandHook>,
) -> Json<QueueingResponse> {
    let commands = state.service.on_command_queueing(&hook.command).await;
    Json(QueueingResponse { commands })
}

/// Telemetry tick. Shapes we cannot read are dropped, never rejected.
pub async fn current_data(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> StatusCode {
    match serde_json::from_value::<CurrentData>(body) {
        Ok(data) => state.service.on_current_data(&data).await,
        Err(e) => tracing::debug!("Ignoring unreadable telemetry snapshot: {}", e),
    }
    StatusCode::OK
}

/// Raw PID snapshot
pub async fn get_pid(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.service.pid_snapshot().await;
    Json(serde_json::to_value(snapshot).unwrap_or(Value::Null))
}

/// Server-sent plugin messages
pub async fn events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sse_from_receiver(state.service.subscribe())
}

/// Plugin API command dispatch
pub async fn api_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ApiCommand>,
) -> Response {
    let service = &state.service;

    let response = match request.command.as_str() {
        "update" => {
            let plot = service.update_plot().await;
            if plot.is_empty() {
                ApiResponse::failure("no actual temp.")
            } else {
                ApiResponse::ok(&json!({ "data": plot }))
            }
        }
        "getpid" => match request.tool {
            Some(tool) => match service.pid_record(tool).await {
                Ok(record) => ApiResponse::ok(&record),
                Err(e) => ApiResponse::failure(e.to_string()),
            },
            None => match service.pid_snapshot().await {
                Some(snapshot) => ApiResponse::ok(&snapshot),
                None => ApiResponse::failure(PidTuneError::TopologyUnavailable.to_string()),
            },
        },
        "pid_autotune" => match request.data.get("command").and_then(Value::as_str) {
            Some(command) => match service.forward_command(command).await {
                Ok(()) => ApiResponse::ok(&json!({ "data": "ok" })),
                Err(e) => {
                    tracing::error!("Failed to forward autotune command: {}", e);
                    ApiResponse::failure(r#"{"data": "error"}"#)
                }
            },
            None => ApiResponse::failure(r#"{"data": "error"}"#),
        },
        "autotune" => match serde_json::from_value::<AutotuneRequest>(request.data) {
            Ok(req) => match service.autotune(&req.heater, req.target, req.cycles).await {
                Ok(command) => ApiResponse::ok(&json!({ "command": command })),
                Err(e) => {
                    tracing::info!("Autotune request refused: {}", e);
                    ApiResponse::failure(e.to_string())
                }
            },
            Err(e) => ApiResponse::failure(format!("invalid autotune request: {}", e)),
        },
        "printer_profile_updated" => match service.resolve_topology().await {
            Ok(names) => ApiResponse::ok(&names),
            Err(e) => {
                tracing::warn!("Printer profile refresh failed: {}", e);
                ApiResponse::failure("Profile is none.")
            }
        },
        "minmax" => match service.extremes().await {
            Some(extremes) => ApiResponse::ok(&extremes),
            None => ApiResponse::failure(PidTuneError::TopologyUnavailable.to_string()),
        },
        "settings" => ApiResponse::ok(service.settings()),
        "js_error" => {
            service.report_js_error(&request.data).await;
            ApiResponse::ok(&json!({}))
        }
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::failure(format!("unknown command {}", other))),
            )
                .into_response();
        }
    };
    response.into_response()
}
