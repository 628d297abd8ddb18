// src/api.rs
// HTTP surface for the serve (webhook/cron) deployment mode:
//   POST /      — Telegram webhook update, forwarded to the dispatcher
//   *    /      — JSON status snapshot (any non-POST method)
//   GET  /cron  — run one check cycle (external cron trigger)
//   GET  /health

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::commands::CommandDispatcher;
use crate::notify::telegram::Update;
use crate::session::MonitorSession;

#[derive(Clone)]
pub struct AppState {
    pub session: MonitorSession,
    pub dispatcher: Arc<CommandDispatcher>,
}

pub fn router(state: AppState) -> Router {
    // POST is the webhook; every other method answers with the snapshot.
    Router::new()
        .route("/", post(webhook).fallback(status_snapshot))
        .route("/cron", get(cron_check))
        .route("/health", get(|| async { "OK" }))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusSnapshot {
    status: &'static str,
    monitoring: bool,
    processed_count: u64,
    timestamp: String,
}

async fn status_snapshot(State(state): State<AppState>) -> Json<StatusSnapshot> {
    let status = state.session.status();
    Json(StatusSnapshot {
        status: "Bot is running",
        monitoring: status.monitoring,
        processed_count: status.processed_count,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Transport-native update payload, forwarded verbatim to the command
/// dispatcher. An undecodable body is the caller's problem, not ours.
async fn webhook(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, &'static str) {
    match serde_json::from_value::<Update>(body) {
        Ok(update) => {
            state.dispatcher.handle_update(update).await;
            (StatusCode::OK, "OK")
        }
        Err(e) => {
            tracing::warn!(error = %e, "undecodable webhook update");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}

#[derive(Serialize)]
struct CronResponse {
    status: &'static str,
    message: String,
    projects: usize,
}

async fn cron_check(State(state): State<AppState>) -> Json<CronResponse> {
    tracing::info!("cron: running check cycle");
    let report = state.session.check_now(None).await;

    let message = if report.found > 0 {
        format!("Found {} new projects", report.found)
    } else {
        "No new projects found".to_string()
    };
    Json(CronResponse {
        status: "success",
        message,
        projects: report.found,
    })
}
