//! Stream control: start, stop and status.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use sr_relay::{StartReport, StopOutcome, StreamStatus};

use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamRequest {
    pub stream_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartStreamResponse {
    pub success: bool,
    pub message: String,
    pub debug: StartReport,
}

#[derive(Debug, Serialize)]
pub struct StopStreamResponse {
    pub success: bool,
    pub message: String,
}

/// POST /start-stream -- relay `streamUrl` to the ingest, replacing any
/// running stream.
pub async fn start_stream(
    State(ctx): State<AppContext>,
    body: Result<Json<StartStreamRequest>, JsonRejection>,
) -> Result<Json<StartStreamResponse>, AppError> {
    let stream_url = match body {
        Ok(Json(req)) => req.stream_url.unwrap_or_default(),
        Err(rejection) => {
            tracing::debug!("Rejected start-stream body: {rejection}");
            String::new()
        }
    };

    let report = ctx.supervisor.start(&stream_url).await?;

    Ok(Json(StartStreamResponse {
        success: true,
        message: "Stream started successfully".into(),
        debug: report,
    }))
}

/// POST /stop-stream -- stop the running stream, if any.
pub async fn stop_stream(
    State(ctx): State<AppContext>,
) -> Result<Json<StopStreamResponse>, AppError> {
    let response = match ctx.supervisor.stop().await? {
        StopOutcome::Stopped => StopStreamResponse {
            success: true,
            message: "Stream stopped successfully".into(),
        },
        StopOutcome::NothingRunning => StopStreamResponse {
            success: false,
            message: "No stream is running".into(),
        },
    };
    Ok(Json(response))
}

/// GET /stream-status -- whether a stream is live, its source, and the
/// latest log entries.
pub async fn stream_status(State(ctx): State<AppContext>) -> Json<StreamStatus> {
    Json(ctx.supervisor.status())
}
