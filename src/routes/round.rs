use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::{
        party::{ActorRequest, SubmitStatementsRequest},
        round::{RoundStatementsResponse, VoteRequest, VoteResponse},
        snapshot::PartySnapshot,
    },
    error::AppError,
    routes::actor::PlayerHeader,
    services::party_service,
    state::SharedState,
};

/// Round endpoints, mounted under `/api/v1`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rounds/{id}/statements", post(submit_statements))
        .route("/rounds/{id}/vote", post(vote))
        .route("/rounds/{id}/close", post(close_round))
}

/// Narrator submits the statements of an open phase-2 round.
#[utoipa::path(
    post,
    path = "/api/v1/rounds/{id}/statements",
    tag = "rounds",
    params(
        ("id" = Uuid, Path, description = "Round identifier"),
        ("x-player-id" = Option<Uuid>, Header, description = "Narrator of the round")
    ),
    request_body = SubmitStatementsRequest,
    responses(
        (status = 200, description = "Voting opened", body = RoundStatementsResponse),
        (status = 403, description = "Not the narrator"),
        (status = 409, description = "Round not awaiting statements")
    )
)]
pub async fn submit_statements(
    State(state): State<SharedState>,
    Path(round_id): Path<Uuid>,
    header: PlayerHeader,
    Json(request): Json<SubmitStatementsRequest>,
) -> Result<Json<RoundStatementsResponse>, AppError> {
    let narrator_id = header.actor(request.player_id)?;
    let response =
        party_service::submit_round_statements(&state, round_id, narrator_id, request.drafts())
            .await?;
    Ok(Json(response))
}

/// Cast the acting player's vote.
#[utoipa::path(
    post,
    path = "/api/v1/rounds/{id}/vote",
    tag = "rounds",
    params(
        ("id" = Uuid, Path, description = "Round identifier"),
        ("x-player-id" = Option<Uuid>, Header, description = "Voting player")
    ),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote accepted", body = VoteResponse),
        (status = 403, description = "Player not eligible"),
        (status = 404, description = "Unknown round or statement"),
        (status = 409, description = "Round not voting or vote already cast")
    )
)]
pub async fn vote(
    State(state): State<SharedState>,
    Path(round_id): Path<Uuid>,
    header: PlayerHeader,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    let player_id = header.actor(request.player_id)?;
    let response = party_service::vote(&state, round_id, player_id, request.statement_id).await?;
    Ok(Json(response))
}

/// Close a round early and reveal its lie.
#[utoipa::path(
    post,
    path = "/api/v1/rounds/{id}/close",
    tag = "rounds",
    params(
        ("id" = Uuid, Path, description = "Round identifier"),
        ("x-player-id" = Option<Uuid>, Header, description = "Acting party member")
    ),
    request_body = ActorRequest,
    responses(
        (status = 200, description = "Round closed", body = PartySnapshot),
        (status = 403, description = "Not a party member"),
        (status = 409, description = "Round cannot be closed now")
    )
)]
pub async fn close_round(
    State(state): State<SharedState>,
    Path(round_id): Path<Uuid>,
    header: PlayerHeader,
    body: Option<Json<ActorRequest>>,
) -> Result<Json<PartySnapshot>, AppError> {
    let requester = header.actor(body.and_then(|Json(body)| body.player_id))?;
    Ok(Json(
        party_service::close_round(&state, round_id, requester).await?,
    ))
}
