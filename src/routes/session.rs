use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::session::{CreateSessionRequest, SessionToken, SessionView},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Reconnect session endpoints, mounted under `/api/v1`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route(
            "/sessions/{token}",
            get(get_session).delete(delete_session),
        )
}

/// Issue a session token for a party member.
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionToken),
        (status = 404, description = "Unknown party or player")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionToken>), AppError> {
    let token = session_service::create_session(&state, request).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

#[utoipa::path(
    get,
    path = "/api/v1/sessions/{token}",
    tag = "sessions",
    params(("token" = String, Path, description = "Session token")),
    responses(
        (status = 200, description = "Session", body = SessionView),
        (status = 404, description = "Session not found or expired")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::get_session(&state, &token).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{token}",
    tag = "sessions",
    params(("token" = String, Path, description = "Session token")),
    responses((status = 204, description = "Session deleted"))
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> Result<StatusCode, AppError> {
    session_service::delete_session(&state, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}
