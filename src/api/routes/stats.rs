//! Host statistics endpoints

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use tracing::{debug, info};

use crate::Snapshot;
use crate::api::{error::ApiResult, state::ApiState};

/// GET /api/stats
///
/// Collects a fresh snapshot on demand.
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<Snapshot>> {
    let snapshot = state.source.collect().await?;
    Ok(Json(snapshot))
}

/// GET /api/stats/sse
///
/// Streams every broadcast snapshot as one `data:` frame. The subscription is
/// released when the client disconnects and axum drops the stream.
pub async fn stream_stats(
    State(state): State<ApiState>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let subscription = state.hub.subscribe().await?;
    info!(subscriber = %subscription.id(), "streaming client connected");

    let stream = subscription.map(|message| {
        debug!(bytes = message.len(), "forwarding snapshot");
        Ok(Event::default().data(message))
    });

    Ok(Sse::new(stream))
}
