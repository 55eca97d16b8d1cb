use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::SessionEntity, dto::format_system_time};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub player_id: Uuid,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionToken {
    /// Opaque token to present on reconnect.
    pub token: String,
}

/// Identity restored from a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub player_id: Uuid,
    pub code: String,
    pub created_at: String,
}

impl From<SessionEntity> for SessionView {
    fn from(value: SessionEntity) -> Self {
        Self {
            player_id: value.player_id,
            code: value.code,
            created_at: format_system_time(value.created_at),
        }
    }
}
