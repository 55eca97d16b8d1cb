use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    game::{CompletionReason, GroupStatus, Phase},
    state_machine::{PartyStatus, RoundStatus},
};

/// Party aggregate root persisted by the storage layer.
///
/// Players and rounds live in their own key spaces; the party only keeps their ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartyEntity {
    /// Primary key of the party.
    pub id: Uuid,
    /// Human-shareable join code (uppercase).
    pub code: String,
    pub status: PartyStatus,
    pub created_at: SystemTime,
    /// Instant after which the party and all its records are discarded.
    pub expires_at: SystemTime,
    pub round_timer_sec: u32,
    pub phase_time_limit_sec: u32,
    pub statement_time_limit_sec: u32,
    pub phase2_multiplier: u32,
    pub groups: Vec<GroupEntity>,
    /// Player ids in join order.
    pub player_ids: Vec<Uuid>,
    pub rounds_by_group: Vec<GroupRoundsEntity>,
    pub phase2_rounds: RoundCursorEntity,
    pub scores: Vec<ScoreEntity>,
    pub leak_scores: Vec<LeakScoreEntity>,
    pub seen_narrators: Vec<SeenNarratorsEntity>,
    pub host_player_id: Option<Uuid>,
    /// Closed rounds, oldest first.
    pub round_history: Vec<RoundRecordEntity>,
    /// Phase-1 statements in submission order.
    pub prep_statements: Vec<PrepSubmissionEntity>,
    pub phase1_prep: PhaseTimingEntity,
    pub phase1: PhaseTimingEntity,
    pub phase2: PhaseTimingEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupEntity {
    pub id: Uuid,
    /// 1-based index, stable for the party lifetime.
    pub index: u32,
    pub status: GroupStatus,
}

/// Ordered round ids of a group along with the position of the current round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupRoundsEntity {
    pub group_id: Uuid,
    #[serde(flatten)]
    pub cursor: RoundCursorEntity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundCursorEntity {
    pub round_ids: Vec<Uuid>,
    pub current: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntity {
    pub player_id: Uuid,
    pub phase1: u32,
    pub phase2: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeakScoreEntity {
    pub player_id: Uuid,
    pub leak: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeenNarratorsEntity {
    pub player_id: Uuid,
    pub narrator_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrepSubmissionEntity {
    pub player_id: Uuid,
    pub statements: Vec<StatementDraftEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatementDraftEntity {
    pub text: String,
    pub is_lie: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseTimingEntity {
    pub started_at: Option<SystemTime>,
    pub deadline_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
    pub completion_reason: Option<CompletionReason>,
}

/// Immutable record of a closed round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundRecordEntity {
    pub round_id: Uuid,
    pub phase: Phase,
    pub index: u32,
    pub group_id: Option<Uuid>,
    pub narrator_id: Uuid,
    pub started_at: Option<SystemTime>,
    pub ended_at: SystemTime,
    pub revealed_lie_statement_id: Option<Uuid>,
    pub lie_text: Option<String>,
    pub votes: Vec<VoteOutcomeEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteOutcomeEntity {
    pub player_id: Uuid,
    pub statement_id: Uuid,
    pub is_correct: bool,
    pub points: u32,
    pub rank_correct: Option<u32>,
    pub time_to_vote_ms: Option<u64>,
    pub picked_text: Option<String>,
}

/// Party member persisted under `player:{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    pub id: Uuid,
    pub party_id: Uuid,
    pub group_id: Uuid,
    pub nickname: String,
    pub is_host: bool,
    pub created_at: SystemTime,
}

/// Round persisted under `round:{id}`, embedding its statements and votes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundEntity {
    pub id: Uuid,
    pub party_id: Uuid,
    /// `None` for phase-2 rounds.
    pub group_id: Option<Uuid>,
    pub phase: Phase,
    /// 1-based position within its sequence.
    pub index: u32,
    pub narrator_id: Uuid,
    pub status: RoundStatus,
    pub statements: Vec<StatementEntity>,
    pub votes: Vec<VoteEntity>,
    pub revealed_lie_statement_id: Option<Uuid>,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatementEntity {
    pub id: Uuid,
    pub round_id: Uuid,
    pub text: String,
    pub is_lie: bool,
    pub display_order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    pub id: Uuid,
    pub round_id: Uuid,
    pub player_id: Uuid,
    pub statement_id: Uuid,
    pub is_correct: bool,
    pub rank_correct: Option<u32>,
    pub points: u32,
    pub created_at: SystemTime,
    /// Arrival order inside the round, used to break `created_at` ties.
    pub seq: u32,
    pub time_to_vote_ms: Option<u64>,
}

/// Opaque player session persisted under `session:{token}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    pub player_id: Uuid,
    /// Uppercased party code.
    pub code: String,
    pub created_at: SystemTime,
}
