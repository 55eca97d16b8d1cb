use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Two Truths Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::party::create_party,
        crate::routes::party::get_party,
        crate::routes::party::join_party,
        crate::routes::party::remove_player,
        crate::routes::party::submit_statements,
        crate::routes::party::start_phase1,
        crate::routes::party::start_phase2,
        crate::routes::round::submit_statements,
        crate::routes::round::vote,
        crate::routes::round::close_round,
        crate::routes::session::create_session,
        crate::routes::session::get_session,
        crate::routes::session::delete_session,
        crate::routes::sse::party_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::party::CreatePartyRequest,
            crate::dto::party::CreatedParty,
            crate::dto::party::JoinPartyRequest,
            crate::dto::party::JoinedParty,
            crate::dto::party::ActorRequest,
            crate::dto::party::StatementInput,
            crate::dto::party::SubmitStatementsRequest,
            crate::dto::party::SnapshotAck,
            crate::dto::round::VoteRequest,
            crate::dto::round::VoteResponse,
            crate::dto::round::RoundStatementsResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::SessionToken,
            crate::dto::session::SessionView,
            crate::dto::snapshot::PartySnapshot,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "parties", description = "Party lobby and phase control"),
        (name = "rounds", description = "Round statements, votes and closing"),
        (name = "sessions", description = "Reconnect tokens for players"),
        (name = "events", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
