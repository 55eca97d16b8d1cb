//! Read-only projection of a party sent to clients.

use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    game::{CompletionReason, GroupStatus},
    state_machine::{PartyStatus, RoundStatus},
};

/// Full party view returned after every mutation and pushed over SSE.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartySnapshot {
    pub id: Uuid,
    pub code: String,
    pub status: PartyStatus,
    pub round_timer_sec: u32,
    pub phase_time_limit_sec: u32,
    pub statement_time_limit_sec: u32,
    pub phase2_multiplier: u32,
    pub host_player_id: Option<Uuid>,
    pub phase_timing: PhaseTimingView,
    pub phase_results: PhaseResultsView,
    pub phase2_eligibility: Phase2Eligibility,
    /// Most recently closed round.
    pub last_reveal: Option<LastReveal>,
    pub groups: Vec<GroupView>,
    pub players: Vec<PlayerView>,
    pub phase2_current_round: Option<RoundView>,
    /// Players by total score, best first.
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimingView {
    pub phase1_prep: PrepTimingView,
    pub phase1: TimingView,
    pub phase2: TimingView,
}

/// RFC 3339 timestamps of a timed phase.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimingView {
    pub started_at: Option<String>,
    pub deadline_at: Option<String>,
    pub completed_at: Option<String>,
    pub completion_reason: Option<CompletionReason>,
}

/// Statement collection window with submission progress.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrepTimingView {
    #[serde(flatten)]
    pub timing: TimingView,
    pub submitted_count: usize,
    pub total_players: usize,
    pub submitted_players: Vec<SubmittedPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedPlayer {
    pub player_id: Uuid,
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResultsView {
    /// Present once phase 1 is completed.
    pub phase1: Option<Phase1Results>,
    /// Present once phase 2 is completed.
    pub phase2: Option<Phase2Results>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Phase1Results {
    pub completed_at: Option<String>,
    pub completion_reason: Option<CompletionReason>,
    pub groups: Vec<GroupResult>,
    pub mistaken_players: Vec<MistakenPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub group_id: Uuid,
    pub group_index: u32,
    /// Players tied for the best phase-1 score.
    pub winners: Vec<Phase1Winner>,
    /// Players tied for the lowest leak score.
    pub best_liars: Vec<GroupScoreLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupScoreLine {
    pub player_id: Uuid,
    pub nickname: String,
    pub phase1: u32,
    pub leak_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Phase1Winner {
    #[serde(flatten)]
    pub line: GroupScoreLine,
    /// Fastest correct vote of the phase, in seconds.
    pub best_find_time_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Phase2Results {
    pub completed_at: Option<String>,
    pub completion_reason: Option<CompletionReason>,
    pub final_winners: Vec<FinalWinner>,
    pub mistaken_players: Vec<MistakenPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalWinner {
    #[serde(flatten)]
    pub entry: LeaderboardEntry,
    pub best_find_time_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MistakenPlayer {
    pub player_id: Uuid,
    pub nickname: String,
    pub wrong_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Phase2Eligibility {
    pub allowed: bool,
    /// `single_group_no_phase2` when not allowed.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastReveal {
    pub round_id: Uuid,
    pub phase: u8,
    pub index: u32,
    pub group_id: Option<Uuid>,
    pub narrator_id: Uuid,
    pub narrator_nickname: String,
    pub lie_text: Option<String>,
    pub ended_at: String,
    pub votes: Vec<RevealVote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevealVote {
    pub player_id: Uuid,
    pub nickname: String,
    pub is_correct: bool,
    pub points: u32,
    pub rank_correct: Option<u32>,
    pub time_to_vote_ms: Option<u64>,
    pub picked_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: Uuid,
    pub index: u32,
    pub status: GroupStatus,
    pub players: Vec<GroupMember>,
    pub current_round: Option<RoundView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub id: Uuid,
    pub nickname: String,
    pub is_host: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: Uuid,
    pub nickname: String,
    pub group_id: Uuid,
    pub is_host: bool,
}

/// Public projection of a round; never reveals the lie before closure.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub id: Uuid,
    pub phase: u8,
    pub index: u32,
    pub group_id: Option<Uuid>,
    pub narrator_id: Uuid,
    pub status: RoundStatus,
    /// Empty while the narrator has not submitted.
    pub statements: Vec<StatementView>,
    pub revealed_lie_statement_id: Option<Uuid>,
    pub votes_count: usize,
    pub voter_ids: Vec<Uuid>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementView {
    pub id: Uuid,
    pub text: String,
    pub display_order: u32,
    /// Only set once the round is closed.
    pub is_lie: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub player_id: Uuid,
    pub nickname: String,
    pub group_id: Uuid,
    pub phase1: u32,
    pub phase2: u32,
    pub total: u32,
    pub leak_score: Option<u32>,
}
