pub mod health;
pub mod imports;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /imports/catalog                          target field catalog (GET)
/// /imports                                  upload spreadsheet (POST, multipart)
/// /imports/{id}                             session view (GET), discard (DELETE)
/// /imports/{id}/mapping                     replace (PUT), override one header (PATCH)
/// /imports/{id}/preview                     build preview (POST)
/// /imports/{id}/rows/{index}                select / deselect one row (PATCH)
/// /imports/{id}/rows/select-all             select / deselect every row (POST)
/// /imports/{id}/reset                       back to mapping (POST)
/// /imports/{id}/commit                      start commit (POST, 202)
/// /imports/{id}/progress                    progress snapshot (GET)
/// /imports/{id}/progress/ws                 live progress (WebSocket)
/// /imports/{id}/report                      final summary (GET)
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new().nest("/imports", imports::router(config))
}
