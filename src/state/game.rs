//! In-memory party aggregate: groups, players, rounds, scores and phase timing.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::{Duration, SystemTime},
};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{
        GroupEntity, GroupRoundsEntity, LeakScoreEntity, PartyEntity, PhaseTimingEntity,
        PlayerEntity, PrepSubmissionEntity, RoundCursorEntity, RoundEntity, RoundRecordEntity,
        ScoreEntity, SeenNarratorsEntity, StatementDraftEntity, StatementEntity, VoteEntity,
        VoteOutcomeEntity,
    },
    state::state_machine::{InvalidTransition, PartyEvent, PartyStatus, RoundEvent, RoundStatus},
};

/// Lifetime of a party and every record attached to it.
pub const PARTY_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Point multiplier applied to correct phase-2 votes.
pub const PHASE2_MULTIPLIER: u32 = 2;

/// Progress of a group through its phase-1 rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    Waiting,
    Playing,
    Done,
}

/// Game phase a round belongs to. Serialized as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Phase {
    /// Rounds scoped to a single group.
    One,
    /// Cross-group rounds.
    Two,
}

impl Phase {
    /// Numeric form used on the wire.
    pub fn number(self) -> u8 {
        match self {
            Phase::One => 1,
            Phase::Two => 2,
        }
    }
}

impl From<Phase> for u8 {
    fn from(value: Phase) -> Self {
        value.number()
    }
}

impl TryFrom<u8> for Phase {
    type Error = UnknownPhase;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Phase::One),
            2 => Ok(Phase::Two),
            other => Err(UnknownPhase(other)),
        }
    }
}

/// Raised when decoding a phase number other than 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownPhase(pub u8);

impl fmt::Display for UnknownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown phase {}", self.0)
    }
}

/// Why a timed phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Every player submitted their statements.
    AllSubmitted,
    /// The phase deadline passed.
    TimeLimit,
    /// Every round of the phase has been played.
    AllPlayed,
}

/// Timers fixed at party creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartySettings {
    pub round_timer_sec: u32,
    pub phase_time_limit_sec: u32,
    pub statement_time_limit_sec: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: Uuid,
    /// 1-based; a new group takes the highest current index plus one.
    pub index: u32,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: Uuid,
    pub party_id: Uuid,
    /// Fixed at join time.
    pub group_id: Uuid,
    pub nickname: String,
    pub is_host: bool,
    pub created_at: SystemTime,
}

/// Validated statement waiting to be attached to a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementDraft {
    pub text: String,
    pub is_lie: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub id: Uuid,
    pub text: String,
    pub is_lie: bool,
    /// 1-based display position.
    pub display_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub id: Uuid,
    pub player_id: Uuid,
    pub statement_id: Uuid,
    pub is_correct: bool,
    /// Position among correct votes, assigned at closure.
    pub rank_correct: Option<u32>,
    pub points: u32,
    pub created_at: SystemTime,
    /// Arrival order inside the round.
    pub seq: u32,
    pub time_to_vote_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub id: Uuid,
    pub party_id: Uuid,
    pub group_id: Option<Uuid>,
    pub phase: Phase,
    pub index: u32,
    pub narrator_id: Uuid,
    pub status: RoundStatus,
    pub statements: Vec<Statement>,
    /// At most one vote per player, in arrival order.
    pub votes: IndexMap<Uuid, Vote>,
    pub revealed_lie_statement_id: Option<Uuid>,
    pub started_at: Option<SystemTime>,
    pub ended_at: Option<SystemTime>,
}

impl Round {
    /// Create a queued round without statements.
    pub fn draft(
        party_id: Uuid,
        group_id: Option<Uuid>,
        phase: Phase,
        index: u32,
        narrator_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            party_id,
            group_id,
            phase,
            index,
            narrator_id,
            status: RoundStatus::Draft,
            statements: Vec::new(),
            votes: IndexMap::new(),
            revealed_lie_statement_id: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Replace the statements of the round, assigning ids and display order.
    pub fn attach_statements(&mut self, drafts: Vec<StatementDraft>) {
        self.statements = drafts
            .into_iter()
            .zip(1..)
            .map(|(draft, display_order)| Statement {
                id: Uuid::new_v4(),
                text: draft.text,
                is_lie: draft.is_lie,
                display_order,
            })
            .collect();
    }

    /// Apply a lifecycle event to the round.
    pub fn apply(&mut self, event: RoundEvent) -> Result<RoundStatus, InvalidTransition> {
        self.status = self.status.next(event)?;
        Ok(self.status)
    }

    pub fn statement(&self, id: Uuid) -> Option<&Statement> {
        self.statements.iter().find(|statement| statement.id == id)
    }

    pub fn lie(&self) -> Option<&Statement> {
        self.statements.iter().find(|statement| statement.is_lie)
    }

    /// Multiplier applied to correct votes of this round.
    pub fn multiplier(&self, phase2_multiplier: u32) -> u32 {
        match self.phase {
            Phase::One => 1,
            Phase::Two => phase2_multiplier,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerScore {
    pub phase1: u32,
    pub phase2: u32,
    pub total: u32,
}

impl PlayerScore {
    /// Credit points to the given phase and refresh the total.
    pub fn add(&mut self, phase: Phase, points: u32) {
        match phase {
            Phase::One => self.phase1 += points,
            Phase::Two => self.phase2 += points,
        }
        self.total = self.phase1 + self.phase2;
    }
}

/// Start, deadline and completion of a timed phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    pub started_at: Option<SystemTime>,
    pub deadline_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
    pub completion_reason: Option<CompletionReason>,
}

impl PhaseTiming {
    /// Open a window of `limit_sec` seconds starting at `now`.
    pub fn open(now: SystemTime, limit_sec: u32) -> Self {
        Self {
            started_at: Some(now),
            deadline_at: Some(now + Duration::from_secs(u64::from(limit_sec))),
            completed_at: None,
            completion_reason: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Whether the window is still open although its deadline has passed.
    pub fn is_overdue(&self, now: SystemTime) -> bool {
        !self.is_completed() && self.deadline_at.is_some_and(|deadline| deadline <= now)
    }

    /// Stamp completion; returns `false` if the phase was already complete.
    pub fn complete(&mut self, now: SystemTime, reason: CompletionReason) -> bool {
        if self.is_completed() {
            return false;
        }
        self.completed_at = Some(now);
        self.completion_reason = Some(reason);
        true
    }
}

/// Ordered round ids with the position of the round being played.
///
/// `current == round_ids.len()` means the sequence is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundCursor {
    pub round_ids: Vec<Uuid>,
    pub current: usize,
}

impl RoundCursor {
    pub fn new(round_ids: Vec<Uuid>) -> Self {
        Self {
            round_ids,
            current: 0,
        }
    }

    pub fn current_id(&self) -> Option<Uuid> {
        self.round_ids.get(self.current).copied()
    }

    /// Move to the next round, returning its id, or exhaust the sequence.
    pub fn advance(&mut self) -> Option<Uuid> {
        let next = self.current + 1;
        if next >= self.round_ids.len() {
            self.current = self.round_ids.len();
            return None;
        }
        self.current = next;
        self.round_ids.get(next).copied()
    }

    pub fn exhaust(&mut self) {
        self.current = self.round_ids.len();
    }
}

/// Outcome of a single vote inside a [`RoundRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    pub player_id: Uuid,
    pub statement_id: Uuid,
    pub is_correct: bool,
    pub points: u32,
    pub rank_correct: Option<u32>,
    pub time_to_vote_ms: Option<u64>,
    pub picked_text: Option<String>,
}

/// Immutable history entry written once when a round closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRecord {
    pub round_id: Uuid,
    pub phase: Phase,
    pub index: u32,
    pub group_id: Option<Uuid>,
    pub narrator_id: Uuid,
    pub started_at: Option<SystemTime>,
    pub ended_at: SystemTime,
    pub revealed_lie_statement_id: Option<Uuid>,
    pub lie_text: Option<String>,
    pub votes: Vec<VoteOutcome>,
}

/// Party aggregate holding relationship keys and per-player tallies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub id: Uuid,
    pub code: String,
    pub status: PartyStatus,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub settings: PartySettings,
    pub phase2_multiplier: u32,
    /// Groups ordered by index.
    pub groups: Vec<Group>,
    pub rounds_by_group: IndexMap<Uuid, RoundCursor>,
    pub phase2_rounds: RoundCursor,
    pub scores: IndexMap<Uuid, PlayerScore>,
    /// Phase-1 points conceded by each narrator.
    pub leak_scores: IndexMap<Uuid, u32>,
    /// Narrators each player has already judged.
    pub seen_narrators: IndexMap<Uuid, IndexSet<Uuid>>,
    pub host_player_id: Option<Uuid>,
    pub round_history: Vec<RoundRecord>,
    /// Phase-1 statements keyed by player, in submission order.
    pub prep_statements: IndexMap<Uuid, Vec<StatementDraft>>,
    pub phase1_prep: PhaseTiming,
    pub phase1: PhaseTiming,
    pub phase2: PhaseTiming,
}

impl Party {
    /// Build a lobby party with `group_count` empty groups.
    pub fn new(code: String, settings: PartySettings, group_count: u32, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            status: PartyStatus::Lobby,
            created_at: now,
            expires_at: now + PARTY_TTL,
            settings,
            phase2_multiplier: PHASE2_MULTIPLIER,
            groups: (1..=group_count)
                .map(|index| Group {
                    id: Uuid::new_v4(),
                    index,
                    status: GroupStatus::Waiting,
                })
                .collect(),
            rounds_by_group: IndexMap::new(),
            phase2_rounds: RoundCursor::default(),
            scores: IndexMap::new(),
            leak_scores: IndexMap::new(),
            seen_narrators: IndexMap::new(),
            host_player_id: None,
            round_history: Vec::new(),
            prep_statements: IndexMap::new(),
            phase1_prep: PhaseTiming::default(),
            phase1: PhaseTiming::default(),
            phase2: PhaseTiming::default(),
        }
    }

    /// Apply a lifecycle event to the party.
    pub fn apply(&mut self, event: PartyEvent) -> Result<PartyStatus, InvalidTransition> {
        self.status = self.status.next(event)?;
        Ok(self.status)
    }

    pub fn group_mut(&mut self, id: Uuid) -> Option<&mut Group> {
        self.groups.iter_mut().find(|group| group.id == id)
    }

    /// Append a new group after the highest existing index.
    pub fn add_group(&mut self) -> Uuid {
        let index = self.groups.iter().map(|group| group.index).max().unwrap_or(0) + 1;
        let id = Uuid::new_v4();
        self.groups.push(Group {
            id,
            index,
            status: GroupStatus::Waiting,
        });
        id
    }
}

/// A party loaded together with its players and rounds.
///
/// Rounds taken out and put back are remembered so only they get persisted.
#[derive(Debug, Clone)]
pub struct PartySession {
    pub party: Party,
    /// Players in join order.
    pub players: IndexMap<Uuid, Player>,
    rounds: HashMap<Uuid, Round>,
    dirty_rounds: HashSet<Uuid>,
    removed_players: Vec<Uuid>,
}

impl PartySession {
    pub fn new(party: Party) -> Self {
        Self {
            party,
            players: IndexMap::new(),
            rounds: HashMap::new(),
            dirty_rounds: HashSet::new(),
            removed_players: Vec::new(),
        }
    }

    pub fn is_member(&self, player_id: Uuid) -> bool {
        self.players.contains_key(&player_id)
    }

    /// Current members of a group, in join order.
    pub fn group_members(&self, group_id: Uuid) -> impl Iterator<Item = &Player> {
        self.players
            .values()
            .filter(move |player| player.group_id == group_id)
    }

    pub fn nickname(&self, player_id: Uuid) -> Option<&str> {
        self.players
            .get(&player_id)
            .map(|player| player.nickname.as_str())
    }

    pub fn round(&self, id: Uuid) -> Option<&Round> {
        self.rounds.get(&id)
    }

    /// Mutable access to a round; the round is marked for persistence.
    pub fn round_mut(&mut self, id: Uuid) -> Option<&mut Round> {
        let round = self.rounds.get_mut(&id)?;
        self.dirty_rounds.insert(id);
        Some(round)
    }

    /// Rounds of the session in no particular order.
    pub fn rounds(&self) -> impl Iterator<Item = &Round> {
        self.rounds.values()
    }

    /// Remove a round from the session so it can be mutated alongside the party.
    pub fn take_round(&mut self, id: Uuid) -> Option<Round> {
        self.rounds.remove(&id)
    }

    /// Store a new or mutated round and mark it for persistence.
    pub fn put_round(&mut self, round: Round) {
        self.dirty_rounds.insert(round.id);
        self.rounds.insert(round.id, round);
    }

    /// Rounds created or modified since the session was loaded.
    pub fn dirty_rounds(&self) -> impl Iterator<Item = &Round> {
        self.dirty_rounds.iter().filter_map(|id| self.rounds.get(id))
    }

    /// Remove a player, remembering the id so the stored record is deleted too.
    pub fn remove_player(&mut self, player_id: Uuid) -> Option<Player> {
        let removed = self.players.shift_remove(&player_id)?;
        self.removed_players.push(player_id);
        Some(removed)
    }

    pub fn removed_players(&self) -> &[Uuid] {
        &self.removed_players
    }
}

impl From<(PartyEntity, Vec<PlayerEntity>, Vec<RoundEntity>)> for PartySession {
    fn from((party, players, rounds): (PartyEntity, Vec<PlayerEntity>, Vec<RoundEntity>)) -> Self {
        let mut session = PartySession::new(party.into());
        session.players = players
            .into_iter()
            .map(|player| (player.id, player.into()))
            .collect();
        session.rounds = rounds
            .into_iter()
            .map(|round| (round.id, round.into()))
            .collect();
        session
    }
}

impl From<&PartySession> for PartyEntity {
    fn from(session: &PartySession) -> Self {
        let party = &session.party;
        Self {
            id: party.id,
            code: party.code.clone(),
            status: party.status,
            created_at: party.created_at,
            expires_at: party.expires_at,
            round_timer_sec: party.settings.round_timer_sec,
            phase_time_limit_sec: party.settings.phase_time_limit_sec,
            statement_time_limit_sec: party.settings.statement_time_limit_sec,
            phase2_multiplier: party.phase2_multiplier,
            groups: party
                .groups
                .iter()
                .map(|group| GroupEntity {
                    id: group.id,
                    index: group.index,
                    status: group.status,
                })
                .collect(),
            player_ids: session.players.keys().copied().collect(),
            rounds_by_group: party
                .rounds_by_group
                .iter()
                .map(|(group_id, cursor)| GroupRoundsEntity {
                    group_id: *group_id,
                    cursor: cursor.into(),
                })
                .collect(),
            phase2_rounds: (&party.phase2_rounds).into(),
            scores: party
                .scores
                .iter()
                .map(|(player_id, score)| ScoreEntity {
                    player_id: *player_id,
                    phase1: score.phase1,
                    phase2: score.phase2,
                    total: score.total,
                })
                .collect(),
            leak_scores: party
                .leak_scores
                .iter()
                .map(|(player_id, leak)| LeakScoreEntity {
                    player_id: *player_id,
                    leak: *leak,
                })
                .collect(),
            seen_narrators: party
                .seen_narrators
                .iter()
                .map(|(player_id, seen)| SeenNarratorsEntity {
                    player_id: *player_id,
                    narrator_ids: seen.iter().copied().collect(),
                })
                .collect(),
            host_player_id: party.host_player_id,
            round_history: party.round_history.iter().map(Into::into).collect(),
            prep_statements: party
                .prep_statements
                .iter()
                .map(|(player_id, drafts)| PrepSubmissionEntity {
                    player_id: *player_id,
                    statements: drafts
                        .iter()
                        .map(|draft| StatementDraftEntity {
                            text: draft.text.clone(),
                            is_lie: draft.is_lie,
                        })
                        .collect(),
                })
                .collect(),
            phase1_prep: party.phase1_prep.into(),
            phase1: party.phase1.into(),
            phase2: party.phase2.into(),
        }
    }
}

impl From<PartyEntity> for Party {
    fn from(value: PartyEntity) -> Self {
        Self {
            id: value.id,
            code: value.code,
            status: value.status,
            created_at: value.created_at,
            expires_at: value.expires_at,
            settings: PartySettings {
                round_timer_sec: value.round_timer_sec,
                phase_time_limit_sec: value.phase_time_limit_sec,
                statement_time_limit_sec: value.statement_time_limit_sec,
            },
            phase2_multiplier: value.phase2_multiplier,
            groups: value
                .groups
                .into_iter()
                .map(|group| Group {
                    id: group.id,
                    index: group.index,
                    status: group.status,
                })
                .collect(),
            rounds_by_group: value
                .rounds_by_group
                .into_iter()
                .map(|entry| (entry.group_id, entry.cursor.into()))
                .collect(),
            phase2_rounds: value.phase2_rounds.into(),
            scores: value
                .scores
                .into_iter()
                .map(|score| {
                    (
                        score.player_id,
                        PlayerScore {
                            phase1: score.phase1,
                            phase2: score.phase2,
                            total: score.total,
                        },
                    )
                })
                .collect(),
            leak_scores: value
                .leak_scores
                .into_iter()
                .map(|entry| (entry.player_id, entry.leak))
                .collect(),
            seen_narrators: value
                .seen_narrators
                .into_iter()
                .map(|entry| (entry.player_id, entry.narrator_ids.into_iter().collect()))
                .collect(),
            host_player_id: value.host_player_id,
            round_history: value.round_history.into_iter().map(Into::into).collect(),
            prep_statements: value
                .prep_statements
                .into_iter()
                .map(|entry| {
                    let drafts = entry
                        .statements
                        .into_iter()
                        .map(|draft| StatementDraft {
                            text: draft.text,
                            is_lie: draft.is_lie,
                        })
                        .collect();
                    (entry.player_id, drafts)
                })
                .collect(),
            phase1_prep: value.phase1_prep.into(),
            phase1: value.phase1.into(),
            phase2: value.phase2.into(),
        }
    }
}

impl From<&RoundCursor> for RoundCursorEntity {
    fn from(value: &RoundCursor) -> Self {
        Self {
            round_ids: value.round_ids.clone(),
            current: value.current,
        }
    }
}

impl From<RoundCursorEntity> for RoundCursor {
    fn from(value: RoundCursorEntity) -> Self {
        Self {
            round_ids: value.round_ids,
            current: value.current,
        }
    }
}

impl From<PhaseTiming> for PhaseTimingEntity {
    fn from(value: PhaseTiming) -> Self {
        Self {
            started_at: value.started_at,
            deadline_at: value.deadline_at,
            completed_at: value.completed_at,
            completion_reason: value.completion_reason,
        }
    }
}

impl From<PhaseTimingEntity> for PhaseTiming {
    fn from(value: PhaseTimingEntity) -> Self {
        Self {
            started_at: value.started_at,
            deadline_at: value.deadline_at,
            completed_at: value.completed_at,
            completion_reason: value.completion_reason,
        }
    }
}

impl From<&RoundRecord> for RoundRecordEntity {
    fn from(value: &RoundRecord) -> Self {
        Self {
            round_id: value.round_id,
            phase: value.phase,
            index: value.index,
            group_id: value.group_id,
            narrator_id: value.narrator_id,
            started_at: value.started_at,
            ended_at: value.ended_at,
            revealed_lie_statement_id: value.revealed_lie_statement_id,
            lie_text: value.lie_text.clone(),
            votes: value
                .votes
                .iter()
                .map(|vote| VoteOutcomeEntity {
                    player_id: vote.player_id,
                    statement_id: vote.statement_id,
                    is_correct: vote.is_correct,
                    points: vote.points,
                    rank_correct: vote.rank_correct,
                    time_to_vote_ms: vote.time_to_vote_ms,
                    picked_text: vote.picked_text.clone(),
                })
                .collect(),
        }
    }
}

impl From<RoundRecordEntity> for RoundRecord {
    fn from(value: RoundRecordEntity) -> Self {
        Self {
            round_id: value.round_id,
            phase: value.phase,
            index: value.index,
            group_id: value.group_id,
            narrator_id: value.narrator_id,
            started_at: value.started_at,
            ended_at: value.ended_at,
            revealed_lie_statement_id: value.revealed_lie_statement_id,
            lie_text: value.lie_text,
            votes: value
                .votes
                .into_iter()
                .map(|vote| VoteOutcome {
                    player_id: vote.player_id,
                    statement_id: vote.statement_id,
                    is_correct: vote.is_correct,
                    points: vote.points,
                    rank_correct: vote.rank_correct,
                    time_to_vote_ms: vote.time_to_vote_ms,
                    picked_text: vote.picked_text,
                })
                .collect(),
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            party_id: value.party_id,
            group_id: value.group_id,
            nickname: value.nickname,
            is_host: value.is_host,
            created_at: value.created_at,
        }
    }
}

impl From<&Player> for PlayerEntity {
    fn from(value: &Player) -> Self {
        Self {
            id: value.id,
            party_id: value.party_id,
            group_id: value.group_id,
            nickname: value.nickname.clone(),
            is_host: value.is_host,
            created_at: value.created_at,
        }
    }
}

impl From<RoundEntity> for Round {
    fn from(value: RoundEntity) -> Self {
        Self {
            id: value.id,
            party_id: value.party_id,
            group_id: value.group_id,
            phase: value.phase,
            index: value.index,
            narrator_id: value.narrator_id,
            status: value.status,
            statements: value
                .statements
                .into_iter()
                .map(|statement| Statement {
                    id: statement.id,
                    text: statement.text,
                    is_lie: statement.is_lie,
                    display_order: statement.display_order,
                })
                .collect(),
            votes: value
                .votes
                .into_iter()
                .map(|vote| {
                    (
                        vote.player_id,
                        Vote {
                            id: vote.id,
                            player_id: vote.player_id,
                            statement_id: vote.statement_id,
                            is_correct: vote.is_correct,
                            rank_correct: vote.rank_correct,
                            points: vote.points,
                            created_at: vote.created_at,
                            seq: vote.seq,
                            time_to_vote_ms: vote.time_to_vote_ms,
                        },
                    )
                })
                .collect(),
            revealed_lie_statement_id: value.revealed_lie_statement_id,
            started_at: value.started_at,
            ended_at: value.ended_at,
        }
    }
}

impl From<&Round> for RoundEntity {
    fn from(value: &Round) -> Self {
        Self {
            id: value.id,
            party_id: value.party_id,
            group_id: value.group_id,
            phase: value.phase,
            index: value.index,
            narrator_id: value.narrator_id,
            status: value.status,
            statements: value
                .statements
                .iter()
                .map(|statement| StatementEntity {
                    id: statement.id,
                    round_id: value.id,
                    text: statement.text.clone(),
                    is_lie: statement.is_lie,
                    display_order: statement.display_order,
                })
                .collect(),
            votes: value
                .votes
                .values()
                .map(|vote| VoteEntity {
                    id: vote.id,
                    round_id: value.id,
                    player_id: vote.player_id,
                    statement_id: vote.statement_id,
                    is_correct: vote.is_correct,
                    rank_correct: vote.rank_correct,
                    points: vote.points,
                    created_at: vote.created_at,
                    seq: vote.seq,
                    time_to_vote_ms: vote.time_to_vote_ms,
                })
                .collect(),
            revealed_lie_statement_id: value.revealed_lie_statement_id,
            started_at: value.started_at,
            ended_at: value.ended_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PartySettings {
        PartySettings {
            round_timer_sec: 120,
            phase_time_limit_sec: 600,
            statement_time_limit_sec: 120,
        }
    }

    #[test]
    fn new_party_creates_indexed_groups() {
        let now = SystemTime::now();
        let mut party = Party::new("ABCDE".into(), settings(), 2, now);
        assert_eq!(party.status, PartyStatus::Lobby);
        assert_eq!(party.expires_at, now + PARTY_TTL);
        assert_eq!(
            party.groups.iter().map(|g| g.index).collect::<Vec<_>>(),
            vec![1, 2]
        );
        party.add_group();
        assert_eq!(party.groups.last().map(|g| g.index), Some(3));
    }

    #[test]
    fn added_group_follows_highest_index() {
        let mut party = Party::new("ABCDE".into(), settings(), 3, SystemTime::now());
        party.groups.remove(1);
        party.add_group();
        assert_eq!(
            party.groups.iter().map(|g| g.index).collect::<Vec<_>>(),
            vec![1, 3, 4]
        );
    }

    #[test]
    fn cursor_exhausts_after_last_round() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut cursor = RoundCursor::new(ids.clone());
        assert_eq!(cursor.current_id(), Some(ids[0]));
        assert_eq!(cursor.advance(), Some(ids[1]));
        assert_eq!(cursor.advance(), None);
        assert_eq!(cursor.current_id(), None);
        assert_eq!(cursor.current, 2);
    }

    #[test]
    fn phase_timing_completes_once() {
        let now = SystemTime::now();
        let mut timing = PhaseTiming::open(now, 60);
        assert!(!timing.is_overdue(now));
        assert!(timing.is_overdue(now + Duration::from_secs(60)));
        assert!(timing.complete(now, CompletionReason::AllPlayed));
        assert!(!timing.complete(now, CompletionReason::TimeLimit));
        assert_eq!(timing.completion_reason, Some(CompletionReason::AllPlayed));
        assert!(!timing.is_overdue(now + Duration::from_secs(120)));
    }

    #[test]
    fn statements_get_display_order_in_submission_order() {
        let mut round = Round::draft(Uuid::new_v4(), None, Phase::Two, 1, Uuid::new_v4());
        round.attach_statements(vec![
            StatementDraft {
                text: "a".into(),
                is_lie: false,
            },
            StatementDraft {
                text: "b".into(),
                is_lie: true,
            },
        ]);
        assert_eq!(
            round
                .statements
                .iter()
                .map(|s| s.display_order)
                .collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(round.lie().map(|s| s.text.as_str()), Some("b"));
    }

    #[test]
    fn party_entity_conversion_keeps_aggregate_maps() {
        let now = SystemTime::now();
        let mut session = PartySession::new(Party::new("ABCDE".into(), settings(), 1, now));
        let group_id = session.party.groups[0].id;
        let player = Player {
            id: Uuid::new_v4(),
            party_id: session.party.id,
            group_id,
            nickname: "Ann".into(),
            is_host: true,
            created_at: now,
        };
        session.party.scores.insert(player.id, PlayerScore::default());
        session
            .party
            .seen_narrators
            .insert(player.id, IndexSet::from([Uuid::new_v4()]));
        session.players.insert(player.id, player.clone());

        let entity = PartyEntity::from(&session);
        assert_eq!(entity.player_ids, vec![player.id]);

        let restored: PartySession =
            (entity, vec![PlayerEntity::from(&player)], Vec::new()).into();
        assert_eq!(restored.party, session.party);
        assert_eq!(restored.players.get(&player.id), Some(&player));
    }

    #[test]
    fn phase_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Phase::Two).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Phase>("1").unwrap(), Phase::One);
        assert!(serde_json::from_str::<Phase>("3").is_err());
    }
}
