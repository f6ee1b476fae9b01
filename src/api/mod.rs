//! Local-loopback HTTP surface. Handlers enqueue items or read derived
//! views; none require authentication (loopback bind only).

pub mod terminal;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;

use crate::error::SoulAgentError;
use crate::ingest::{IngestItem, Source};
use crate::insight::InsightEngine;
use crate::state::AppState;
use crate::todo::TodoStatus;
use crate::vault::store::DIR_CORE;

pub type ApiState = Arc<AppState>;

/// Wraps `SoulAgentError` for HTTP responses as `{error, kind}` JSON with
/// the right status code, per the error-handling design.
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message, "kind": self.kind });
        (self.status, Json(body)).into_response()
    }
}

impl From<SoulAgentError> for ApiError {
    fn from(e: SoulAgentError) -> Self {
        let (status, kind) = match &e {
            SoulAgentError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            SoulAgentError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        Self {
            status,
            kind,
            message: e.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        kind: "validation",
        message: message.into(),
    }
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct NoteBody {
    text: String,
}

async fn post_note(
    State(state): State<ApiState>,
    Json(body): Json<NoteBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    state.queue.put(IngestItem::new(body.text, Source::Note));
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct ClaudeCodeBody {
    text: String,
}

async fn post_ingest_claudecode(
    State(state): State<ApiState>,
    Json(body): Json<ClaudeCodeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    state
        .queue
        .put(IngestItem::new(body.text, Source::ClaudeCode));
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct TerminalCmdBody {
    command: String,
    exit_code: i32,
    duration: u64,
    #[serde(default = "default_session_token")]
    session: String,
}

fn default_session_token() -> String {
    "default".to_string()
}

async fn post_terminal_cmd(
    State(state): State<ApiState>,
    Json(body): Json<TerminalCmdBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.terminal_buffers.add_command(
        &state.queue,
        &body.session,
        body.command,
        body.exit_code,
        body.duration,
    );
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    20
}

async fn get_search(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let names = state.vault.list(crate::vault::store::DIR_LOGS)?;
    let mut matches = Vec::new();

    for name in names.iter().rev() {
        let Some(content) = state.vault.read(crate::vault::store::DIR_LOGS, name)? else {
            continue;
        };
        for line in content.lines() {
            if line.to_lowercase().contains(&query.q.to_lowercase()) {
                matches.push(json!({ "file": name, "line": line }));
                if matches.len() >= query.limit {
                    break;
                }
            }
        }
        if matches.len() >= query.limit {
            break;
        }
    }

    Ok(Json(json!({ "matches": matches })))
}

#[derive(Deserialize)]
struct PeriodQuery {
    #[serde(default = "default_period")]
    period: String,
}

fn default_period() -> String {
    "today".to_string()
}

fn dates_for_period(period: &str) -> Vec<NaiveDate> {
    let today = Local::now().date_naive();
    let span = match period {
        "week" => 7,
        "month" => 30,
        _ => 1,
    };
    (0..span).map(|i| today - chrono::Duration::days(i)).collect()
}

async fn get_recall(
    State(state): State<ApiState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut days = Vec::new();
    for date in dates_for_period(&query.period) {
        if let Some(body) = state.daily_log.read_body(date)? {
            days.push(json!({ "date": date.to_string(), "body": body }));
        }
    }
    Ok(Json(json!({ "days": days })))
}

#[derive(Deserialize)]
struct InsightQuery {
    #[serde(default = "default_today")]
    date: String,
}

fn default_today() -> String {
    "today".to_string()
}

fn resolve_date(s: &str) -> Result<NaiveDate, ApiError> {
    if s == "today" {
        Ok(Local::now().date_naive())
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| bad_request(format!("invalid date: {s}")))
    }
}

async fn get_insight(
    State(state): State<ApiState>,
    Query(query): Query<InsightQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = resolve_date(&query.date)?;
    let config = state.config.read().clone();
    let provider: Option<Arc<dyn crate::classifier::LlmProvider>> =
        Some(Arc::new(crate::classifier::OpenAiCompatibleProvider::new(&config.llm)));
    let engine = InsightEngine::new(
        state.vault.clone(),
        state.daily_log.clone(),
        state.todo_store.clone(),
        provider,
    );
    match engine.generate(date).await? {
        Some(report) => Ok(Json(json!({ "date": date.to_string(), "report": report }))),
        None => Ok(Json(json!({ "date": date.to_string(), "report": null, "message": "no data" }))),
    }
}

async fn get_categories(
    State(state): State<ApiState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut counts: std::collections::BTreeMap<String, u32> = std::collections::BTreeMap::new();
    let re = regex::Regex::new(r"\[(\d{2}:\d{2})\]\s+\((\w[\w-]*)\)\s*(?:\[(\w+)\])?\s*(.*)")
        .expect("static regex is valid");

    for date in dates_for_period(&query.period) {
        if let Some(body) = state.daily_log.read_body(date)? {
            for line in body.lines() {
                if let Some(caps) = re.captures(line) {
                    let category = caps
                        .get(3)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_else(|| "uncategorized".to_string());
                    *counts.entry(category).or_insert(0) += 1;
                }
            }
        }
    }

    Ok(Json(json!({ "categories": counts })))
}

#[derive(Deserialize)]
struct TodoListQuery {
    #[serde(default = "default_todo_status")]
    status: String,
}

fn default_todo_status() -> String {
    "active".to_string()
}

#[derive(Serialize)]
struct TodoView {
    id: String,
    text: String,
    priority: String,
    status: String,
    created: String,
    last_activity: Option<String>,
    auto_detected: bool,
}

async fn get_todo_list(
    State(state): State<ApiState>,
    Query(query): Query<TodoListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let items = match query.status.as_str() {
        "active" => state.todo_store.list(Some(TodoStatus::Active))?,
        "done" => state.todo_store.list(Some(TodoStatus::Done))?,
        "stalled" => state.todo_store.stalled(state.config.read().todo.stale_days)?,
        _ => state.todo_store.list(None)?,
    };

    let views: Vec<TodoView> = items
        .into_iter()
        .map(|t| TodoView {
            id: t.id,
            text: t.text,
            priority: t.priority.as_str().to_string(),
            status: t.status.as_str().to_string(),
            created: t.created.to_string(),
            last_activity: t.last_activity.map(|d| d.to_string()),
            auto_detected: t.auto_detected,
        })
        .collect();

    Ok(Json(json!({ "todos": views })))
}

async fn get_todo_progress(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let all = state.todo_store.list(None)?;
    let todo = all
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| ApiError {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: format!("todo {id} not found"),
        })?;

    let activity: Vec<_> = todo
        .activity_log
        .iter()
        .map(|e| json!({ "date": e.date.to_string(), "count": e.count, "sources": e.sources }))
        .collect();

    Ok(Json(
        json!({ "id": todo.id, "text": todo.text, "activity": activity }),
    ))
}

async fn get_core(State(state): State<ApiState>) -> Result<String, ApiError> {
    Ok(state
        .vault
        .read(DIR_CORE, "MEMORY.md")?
        .unwrap_or_default())
}

async fn get_service_status(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptime_seconds": (Local::now() - state.started_at).num_seconds(),
        "pending_queue_items": state.queue.pending_count(),
    }))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/note", post(post_note))
        .route("/terminal/cmd", post(post_terminal_cmd))
        .route("/ingest/claudecode", post(post_ingest_claudecode))
        .route("/search", get(get_search))
        .route("/recall", get(get_recall))
        .route("/insight", get(get_insight))
        .route("/categories", get(get_categories))
        .route("/todo/list", get(get_todo_list))
        .route("/todo/progress/:id", get(get_todo_progress))
        .route("/core", get(get_core))
        .route("/service/status", get(get_service_status))
        .route("/health", get(health))
        .with_state(state)
}

pub fn app(state: ApiState) -> Router {
    router(state)
        .layer(ConcurrencyLimitLayer::new(32))
        .layer(CorsLayer::permissive())
}

pub async fn run_server(state: ApiState, port: u16) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}"))
        .await
        .map_err(|e| format!("failed to bind 127.0.0.1:{port}: {e}"))?;
    tracing::info!("HTTP surface listening on 127.0.0.1:{port}");
    axum::serve(listener, app(state))
        .await
        .map_err(|e| format!("server error: {e}"))
}
