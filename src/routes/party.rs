use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        party::{
            ActorRequest, CreatePartyRequest, CreatedParty, JoinPartyRequest, JoinedParty,
            SnapshotAck, SubmitStatementsRequest,
        },
        snapshot::PartySnapshot,
    },
    error::AppError,
    routes::actor::PlayerHeader,
    services::party_service,
    state::SharedState,
};

/// Party lifecycle endpoints, mounted under `/api/v1`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/parties", post(create_party))
        .route("/parties/{code}", get(get_party))
        .route("/parties/{code}/join", post(join_party))
        .route("/parties/{code}/players/{player_id}", delete(remove_player))
        .route(
            "/parties/{code}/players/{player_id}/remove",
            post(remove_player),
        )
        .route("/parties/{code}/statements", post(submit_statements))
        .route("/parties/{code}/start-phase1", post(start_phase1))
        .route("/parties/{code}/start-phase2", post(start_phase2))
}

/// Create a new party in its lobby.
#[utoipa::path(
    post,
    path = "/api/v1/parties",
    tag = "parties",
    request_body = CreatePartyRequest,
    responses(
        (status = 201, description = "Party created", body = CreatedParty),
        (status = 400, description = "Parameter out of range"),
        (status = 409, description = "Custom code already taken")
    )
)]
pub async fn create_party(
    State(state): State<SharedState>,
    Json(request): Json<CreatePartyRequest>,
) -> Result<(StatusCode, Json<CreatedParty>), AppError> {
    let created = party_service::create_party(&state, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Current snapshot of a party.
#[utoipa::path(
    get,
    path = "/api/v1/parties/{code}",
    tag = "parties",
    params(("code" = String, Path, description = "Party code, case-insensitive")),
    responses(
        (status = 200, description = "Party snapshot", body = PartySnapshot),
        (status = 404, description = "Unknown party")
    )
)]
pub async fn get_party(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<PartySnapshot>, AppError> {
    Ok(Json(party_service::get_snapshot(&state, &code).await?))
}

/// Join a party still in its lobby.
#[utoipa::path(
    post,
    path = "/api/v1/parties/{code}/join",
    tag = "parties",
    params(("code" = String, Path, description = "Party code")),
    request_body = JoinPartyRequest,
    responses(
        (status = 201, description = "Player joined", body = JoinedParty),
        (status = 400, description = "Invalid nickname or group"),
        (status = 409, description = "Party already started or nickname taken")
    )
)]
pub async fn join_party(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(request): Json<JoinPartyRequest>,
) -> Result<(StatusCode, Json<JoinedParty>), AppError> {
    let joined = party_service::join_party(&state, &code, request).await?;
    Ok((StatusCode::CREATED, Json(joined)))
}

/// Remove a player while the party is in its lobby.
#[utoipa::path(
    delete,
    path = "/api/v1/parties/{code}/players/{player_id}",
    tag = "parties",
    params(
        ("code" = String, Path, description = "Party code"),
        ("player_id" = Uuid, Path, description = "Player to remove")
    ),
    responses(
        (status = 200, description = "Player removed", body = SnapshotAck),
        (status = 404, description = "Unknown party or player"),
        (status = 409, description = "Party already started")
    )
)]
pub async fn remove_player(
    State(state): State<SharedState>,
    Path((code, player_id)): Path<(String, Uuid)>,
) -> Result<Json<SnapshotAck>, AppError> {
    let snapshot = party_service::remove_player(&state, &code, player_id).await?;
    Ok(Json(SnapshotAck::new(snapshot)))
}

/// Submit the three phase-1 statements of the acting player.
#[utoipa::path(
    post,
    path = "/api/v1/parties/{code}/statements",
    tag = "parties",
    params(
        ("code" = String, Path, description = "Party code"),
        ("x-player-id" = Option<Uuid>, Header, description = "Acting player")
    ),
    request_body = SubmitStatementsRequest,
    responses(
        (status = 200, description = "Statements stored", body = SnapshotAck),
        (status = 400, description = "Statements malformed"),
        (status = 409, description = "Preparation is over")
    )
)]
pub async fn submit_statements(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    header: PlayerHeader,
    Json(request): Json<SubmitStatementsRequest>,
) -> Result<Json<SnapshotAck>, AppError> {
    let player_id = header.actor(request.player_id)?;
    let snapshot =
        party_service::submit_phase1_statements(&state, &code, player_id, request.drafts()).await?;
    Ok(Json(SnapshotAck::new(snapshot)))
}

/// Open the phase-1 statement preparation.
#[utoipa::path(
    post,
    path = "/api/v1/parties/{code}/start-phase1",
    tag = "parties",
    params(
        ("code" = String, Path, description = "Party code"),
        ("x-player-id" = Option<Uuid>, Header, description = "Acting player")
    ),
    request_body = ActorRequest,
    responses(
        (status = 200, description = "Preparation started", body = PartySnapshot),
        (status = 403, description = "Not a party member"),
        (status = 409, description = "Party not in lobby")
    )
)]
pub async fn start_phase1(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    header: PlayerHeader,
    body: Option<Json<ActorRequest>>,
) -> Result<Json<PartySnapshot>, AppError> {
    let requester = header.actor(body.and_then(|Json(body)| body.player_id))?;
    Ok(Json(
        party_service::start_phase1(&state, &code, requester).await?,
    ))
}

/// Start the cross-group phase once phase 1 is complete.
#[utoipa::path(
    post,
    path = "/api/v1/parties/{code}/start-phase2",
    tag = "parties",
    params(
        ("code" = String, Path, description = "Party code"),
        ("x-player-id" = Option<Uuid>, Header, description = "Acting player")
    ),
    request_body = ActorRequest,
    responses(
        (status = 200, description = "Phase 2 started", body = PartySnapshot),
        (status = 403, description = "Not a party member"),
        (status = 409, description = "Phase 2 not available")
    )
)]
pub async fn start_phase2(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    header: PlayerHeader,
    body: Option<Json<ActorRequest>>,
) -> Result<Json<PartySnapshot>, AppError> {
    let requester = header.actor(body.and_then(|Json(body)| body.player_id))?;
    Ok(Json(
        party_service::start_phase2(&state, &code, requester).await?,
    ))
}
