use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use rolodex_core::commit::{CommitProgress, ProgressSender};
use uuid::Uuid;

use crate::error::AppResult;
use crate::state::AppState;

/// HTTP handler that upgrades the connection to a progress stream.
///
/// The session must exist before the upgrade. The stream pushes the latest
/// snapshot on every change and closes after the completed one.
pub async fn progress_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let handle = state.sessions.get(id).await?;
    let progress = handle.lock().await.progress();
    Ok(ws.on_upgrade(move |socket| stream_progress(socket, id, progress)))
}

/// Serialize one snapshot as a text frame.
pub fn progress_message(progress: &CommitProgress) -> Message {
    let body = serde_json::json!({ "type": "import_progress", "data": progress });
    Message::Text(body.to_string().into())
}

/// Forward watch-channel updates to the socket until the run completes or
/// the client goes away.
async fn stream_progress(socket: WebSocket, session_id: Uuid, progress: ProgressSender) {
    tracing::info!(session_id = %session_id, "Progress WebSocket connected");

    let mut rx = progress.subscribe();
    let (mut sink, mut stream) = socket.split();

    // Sender task: push the current snapshot, then every change.
    let send_task = tokio::spawn(async move {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if sink.send(progress_message(&snapshot)).await.is_err() {
                tracing::debug!(session_id = %session_id, "Progress WebSocket sink closed");
                return;
            }
            if snapshot.is_complete() || rx.changed().await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    // Receiver loop: only watches for the client closing.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "Progress WebSocket receive error");
                break;
            }
        }
    }

    send_task.abort();
    tracing::info!(session_id = %session_id, "Progress WebSocket disconnected");
}
