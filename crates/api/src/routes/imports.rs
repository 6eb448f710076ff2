use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;

use crate::config::ServerConfig;
use crate::handlers::imports;
use crate::state::AppState;
use crate::ws;

/// Slack for multipart framing around the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Mount import session routes (nested under `/imports`).
pub fn router(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/catalog", get(imports::get_catalog))
        .route(
            "/",
            post(imports::upload).layer(DefaultBodyLimit::max(
                config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
            )),
        )
        .route(
            "/{id}",
            get(imports::get_session).delete(imports::discard_session),
        )
        .route(
            "/{id}/mapping",
            patch(imports::assign_column).put(imports::replace_mapping),
        )
        .route("/{id}/preview", post(imports::build_preview))
        .route("/{id}/rows/select-all", post(imports::select_all))
        .route("/{id}/rows/{index}", patch(imports::toggle_row))
        .route("/{id}/reset", post(imports::reset))
        .route("/{id}/commit", post(imports::start_commit))
        .route("/{id}/progress", get(imports::get_progress))
        .route("/{id}/progress/ws", get(ws::progress_ws_handler))
        .route("/{id}/report", get(imports::get_report))
}
