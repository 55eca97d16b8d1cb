use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::snapshot::StatementView,
    state::{game::Round, state_machine::RoundStatus},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    /// Used when the `x-player-id` header is absent.
    pub player_id: Option<Uuid>,
    pub statement_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub accepted: bool,
    /// `CLOSED` when this vote completed the round.
    pub round_status: RoundStatus,
}

/// Statements accepted for a phase-2 round.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundStatementsResponse {
    pub round_id: Uuid,
    pub status: RoundStatus,
    pub statements: Vec<StatementView>,
}

impl From<&Round> for RoundStatementsResponse {
    fn from(round: &Round) -> Self {
        Self {
            round_id: round.id,
            status: round.status,
            statements: round
                .statements
                .iter()
                .map(|statement| StatementView {
                    id: statement.id,
                    text: statement.text.clone(),
                    display_order: statement.display_order,
                    is_lie: None,
                })
                .collect(),
        }
    }
}
