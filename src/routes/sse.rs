use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/api/v1/events/{code}",
    tag = "events",
    params(("code" = String, Path, description = "Party code")),
    responses(
        (status = 200, description = "Party SSE stream: `party.snapshot` then `party.updated` events", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown party")
    )
)]
/// Stream the snapshots of a party as it changes.
pub async fn party_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, initial) = sse_service::subscribe_party(&state, &code).await?;
    let code = code.trim().to_uppercase();
    info!(party = %code, "new party SSE connection");
    Ok(sse_service::to_sse_stream(code, initial, receiver))
}

/// Configure the SSE endpoints, mounted under `/api/v1`.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/events/{code}", get(party_stream))
}
