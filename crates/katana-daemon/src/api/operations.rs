use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Json;
use axum::Extension;
use futures::stream::Stream;
use katana_core::KatanaError;
use katana_models::{ApiResponse, OperationSnapshot};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::DaemonState;

/// `GET /api/operations/:id` — a point-in-time snapshot.
pub async fn get_operation(
    Extension(state): Extension<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<OperationSnapshot>>> {
    let id = parse_id(&id)?;
    let snapshot = state
        .operations
        .snapshot(id)
        .await
        .ok_or_else(|| KatanaError::NotFound {
            kind: "operation".to_string(),
            name: id.to_string(),
        })?;
    Ok(Json(ApiResponse::ok(snapshot)))
}

/// `GET /api/operations/:id/stream` — SSE replay of the backlog followed by
/// live `progress`/`task`/`log`/`complete` events, with a heartbeat comment
/// every 15s so intermediaries don't buffer the stream.
pub async fn stream_operation(
    Extension(state): Extension<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let parsed = parse_id(&id)?;
    let (backlog, rx) = state
        .operations
        .subscribe(parsed)
        .await
        .ok_or_else(|| KatanaError::NotFound {
            kind: "operation".to_string(),
            name: id.clone(),
        })?;

    let stream = async_stream::stream! {
        for event in backlog {
            if let Ok(sse_event) = to_sse_event(&event) {
                yield Ok(sse_event);
            }
        }

        let mut rx = rx;
        loop {
            match tokio::time::timeout(Duration::from_secs(15), rx.recv()).await {
                Ok(Some(event)) => {
                    if let Ok(sse_event) = to_sse_event(&event) {
                        yield Ok(sse_event);
                    }
                }
                Ok(None) => break,
                Err(_elapsed) => yield Ok(Event::default().comment("heartbeat")),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &katana_models::OperationEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.event_name()).json_data(event)
}

fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| KatanaError::Validation(format!("'{raw}' is not a valid operation id")).into())
}
