use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::SessionEntity,
    dto::session::{CreateSessionRequest, SessionToken, SessionView},
    error::ServiceError,
    services::party_service,
    state::SharedState,
};

/// Issue a reconnect token for a member of the party.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<SessionToken, ServiceError> {
    let party_id = party_service::resolve_party_id(state, &request.code).await?;
    let party = state
        .store()
        .find_party(party_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("party not found".into()))?;
    if !party.player_ids.contains(&request.player_id) {
        return Err(ServiceError::NotFound("player not found in party".into()));
    }

    let token = Uuid::new_v4().simple().to_string();
    let session = SessionEntity {
        player_id: request.player_id,
        code: party.code,
        created_at: SystemTime::now(),
    };
    state.store().save_session(token.clone(), session).await?;
    info!(party_id = %party_id, player_id = %request.player_id, "session created");
    Ok(SessionToken { token })
}

pub async fn get_session(state: &SharedState, token: &str) -> Result<SessionView, ServiceError> {
    state
        .store()
        .find_session(token.to_string())
        .await?
        .map(SessionView::from)
        .ok_or_else(|| ServiceError::NotFound("session not found or expired".into()))
}

/// Forget a token; unknown tokens are accepted silently.
pub async fn delete_session(state: &SharedState, token: &str) -> Result<(), ServiceError> {
    state.store().delete_session(token.to_string()).await?;
    Ok(())
}
