use axum::extract::State;
use axum::Json;

use sr_core::LogEntry;

use crate::context::AppContext;

/// GET /logs -- the whole relay log, oldest first.
pub async fn list_logs(State(ctx): State<AppContext>) -> Json<Vec<LogEntry>> {
    Json(ctx.log.all())
}
