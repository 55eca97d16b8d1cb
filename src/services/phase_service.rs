//! Party orchestration over a loaded [`PartySession`]: lobby management, phase-1
//! preparation and group rounds, phase-2 narrator selection and deadline handling.
//!
//! Every function here is synchronous; the caller holds the party lock and
//! persists the session afterwards.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;
use validator::ValidationError;

use crate::{
    dto::validation,
    error::ServiceError,
    services::round_engine::{self, CloseMode},
    state::{
        game::{
            CompletionReason, GroupStatus, Party, PartySession, PartySettings, Phase, PhaseTiming,
            Player, PlayerScore, Round, RoundCursor, StatementDraft,
        },
        state_machine::{PartyEvent, PartyStatus, RoundEvent, RoundStatus},
    },
};

/// Validated parameters of a new party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartyOptions {
    pub groups: u32,
    pub round_timer_sec: u32,
    pub phase_time_limit_sec: u32,
    pub statement_time_limit_sec: u32,
}

impl PartyOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_group_count(self.groups)?;
        validation::validate_round_timer(self.round_timer_sec)?;
        validation::validate_phase_time_limit(self.phase_time_limit_sec)?;
        validation::validate_statement_time_limit(self.statement_time_limit_sec)
    }
}

/// Where a joining player lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupPlacement {
    /// Open a fresh group for the player.
    Create,
    /// Join the group with this id.
    Id(Uuid),
    /// Join the group with this 1-based index.
    Index(u32),
    /// Let the party pick: a new group when none exist, else the smallest one.
    Auto,
}

/// Identity handed back to a player who joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub player_id: Uuid,
    pub is_host: bool,
    pub group_id: Uuid,
}

/// Build a lobby party under `code`.
pub fn new_party(
    code: String,
    options: PartyOptions,
    now: SystemTime,
) -> Result<PartySession, ServiceError> {
    options.validate()?;
    let settings = PartySettings {
        round_timer_sec: options.round_timer_sec,
        phase_time_limit_sec: options.phase_time_limit_sec,
        statement_time_limit_sec: options.statement_time_limit_sec,
    };
    Ok(PartySession::new(Party::new(
        code,
        settings,
        options.groups,
        now,
    )))
}

fn assert_member(session: &PartySession, player_id: Uuid) -> Result<(), ServiceError> {
    if session.is_member(player_id) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized("party member only".into()))
    }
}

/// Add a player to a lobby party.
pub fn join(
    session: &mut PartySession,
    nickname: &str,
    placement: GroupPlacement,
    now: SystemTime,
) -> Result<JoinOutcome, ServiceError> {
    if session.party.status != PartyStatus::Lobby {
        return Err(ServiceError::Conflict("party already started".into()));
    }
    let nickname = validation::normalize_nickname(nickname)?;
    let lowered = nickname.to_lowercase();
    if session
        .players
        .values()
        .any(|player| player.nickname.to_lowercase() == lowered)
    {
        return Err(ServiceError::Conflict(
            "nickname already used in this party".into(),
        ));
    }

    let group_id = match placement {
        GroupPlacement::Create => session.party.add_group(),
        GroupPlacement::Id(id) => session
            .party
            .groups
            .iter()
            .find(|group| group.id == id)
            .map(|group| group.id)
            .ok_or_else(|| ServiceError::Validation("groupId not found".into()))?,
        GroupPlacement::Index(index) if index >= 1 => session
            .party
            .groups
            .iter()
            .find(|group| group.index == index)
            .map(|group| group.id)
            .ok_or_else(|| ServiceError::Validation("groupIndex not found".into()))?,
        GroupPlacement::Index(_) | GroupPlacement::Auto => match smallest_group(session) {
            Some(id) => id,
            None => session.party.add_group(),
        },
    };

    let player = Player {
        id: Uuid::new_v4(),
        party_id: session.party.id,
        group_id,
        nickname,
        is_host: session.players.is_empty(),
        created_at: now,
    };
    let outcome = JoinOutcome {
        player_id: player.id,
        is_host: player.is_host,
        group_id,
    };

    session
        .party
        .scores
        .insert(player.id, PlayerScore::default());
    if player.is_host {
        session.party.host_player_id = Some(player.id);
    }
    info!(
        party = %session.party.code,
        player_id = %player.id,
        nickname = %player.nickname,
        "player joined"
    );
    session.players.insert(player.id, player);

    Ok(outcome)
}

/// Group with the fewest current members, first by index on ties.
fn smallest_group(session: &PartySession) -> Option<Uuid> {
    session
        .party
        .groups
        .iter()
        .min_by_key(|group| (session.group_members(group.id).count(), group.index))
        .map(|group| group.id)
}

/// Remove a player from a lobby party, handing the host role on if needed.
pub fn remove_player(session: &mut PartySession, player_id: Uuid) -> Result<(), ServiceError> {
    if session.party.status != PartyStatus::Lobby {
        return Err(ServiceError::Conflict(
            "player removal is only allowed in lobby".into(),
        ));
    }
    let removed = session
        .remove_player(player_id)
        .ok_or_else(|| ServiceError::NotFound("player not found in party".into()))?;

    let party = &mut session.party;
    party.scores.shift_remove(&player_id);
    party.leak_scores.shift_remove(&player_id);
    party.seen_narrators.shift_remove(&player_id);
    party.prep_statements.shift_remove(&player_id);
    for seen in party.seen_narrators.values_mut() {
        seen.shift_remove(&player_id);
    }

    if removed.is_host {
        let next_host = session.players.keys().next().copied();
        session.party.host_player_id = next_host;
        for player in session.players.values_mut() {
            player.is_host = Some(player.id) == next_host;
        }
    }

    info!(
        party = %session.party.code,
        player_id = %player_id,
        host = ?session.party.host_player_id,
        "player removed"
    );
    Ok(())
}

/// Fail unless every group holds at least two players.
pub fn ensure_groups_ready(session: &PartySession) -> Result<(), ServiceError> {
    for group in &session.party.groups {
        if session.group_members(group.id).count() < 2 {
            return Err(ServiceError::Conflict(format!(
                "group {} needs at least 2 players",
                group.index
            )));
        }
    }
    Ok(())
}

fn all_submitted(session: &PartySession) -> bool {
    session
        .players
        .keys()
        .all(|id| session.party.prep_statements.contains_key(id))
}

/// Leave the lobby and open the statement collection window.
pub fn start_phase1(
    session: &mut PartySession,
    requester_id: Uuid,
    now: SystemTime,
) -> Result<(), ServiceError> {
    assert_member(session, requester_id)?;
    if session.party.status != PartyStatus::Lobby {
        return Err(ServiceError::Conflict("party not in lobby".into()));
    }
    ensure_groups_ready(session)?;

    let party = &mut session.party;
    party.apply(PartyEvent::StartPhase1)?;
    party.phase1 = PhaseTiming::default();
    party.phase1_prep = PhaseTiming::open(now, party.settings.statement_time_limit_sec);
    party
        .prep_statements
        .retain(|player_id, _| session.players.contains_key(player_id));
    party.rounds_by_group.clear();
    for group in &mut party.groups {
        group.status = GroupStatus::Waiting;
        party.rounds_by_group.insert(group.id, RoundCursor::default());
    }
    info!(
        party = %party.code,
        submitted = party.prep_statements.len(),
        players = session.players.len(),
        "phase 1 preparation started"
    );

    if all_submitted(session) {
        finalize_phase1_prep(session, CompletionReason::AllSubmitted, now)?;
    }
    Ok(())
}

/// Store a player's phase-1 statements; may start the game or close preparation.
pub fn submit_phase1_statements(
    session: &mut PartySession,
    player_id: Uuid,
    items: Vec<StatementDraft>,
    now: SystemTime,
) -> Result<(), ServiceError> {
    let status = session.party.status;
    if status != PartyStatus::Lobby && status != PartyStatus::RunningPhase1Prep {
        return Err(ServiceError::Conflict(
            "phase 1 statements can only be submitted in lobby or preparation".into(),
        ));
    }
    assert_member(session, player_id)?;

    let drafts = validation::validate_statements(items)?;
    session.party.prep_statements.insert(player_id, drafts);
    debug!(
        party = %session.party.code,
        player_id = %player_id,
        submitted = session.party.prep_statements.len(),
        "phase 1 statements stored"
    );

    if !all_submitted(session) {
        return Ok(());
    }

    match status {
        PartyStatus::Lobby if session.players.len() >= 2 => {
            if let Err(err) = ensure_groups_ready(session) {
                debug!(party = %session.party.code, %err, "lobby auto-start postponed");
                return Ok(());
            }
            info!(party = %session.party.code, "every player submitted; auto-starting");
            start_phase1(session, player_id, now)
        }
        PartyStatus::RunningPhase1Prep => {
            finalize_phase1_prep(session, CompletionReason::AllSubmitted, now)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Close statement collection and build the phase-1 round sequence of each group.
///
/// Returns `false` when preparation was already finalized.
pub fn finalize_phase1_prep(
    session: &mut PartySession,
    reason: CompletionReason,
    now: SystemTime,
) -> Result<bool, ServiceError> {
    if !session.party.phase1_prep.complete(now, reason) {
        return Ok(false);
    }
    session.party.apply(PartyEvent::PrepFinalized)?;
    session.party.phase1 = PhaseTiming::open(now, session.party.settings.phase_time_limit_sec);

    let party_id = session.party.id;
    let group_ids: Vec<Uuid> = session.party.groups.iter().map(|group| group.id).collect();
    for group_id in group_ids {
        let narrators: Vec<(Uuid, Vec<StatementDraft>)> = session
            .party
            .prep_statements
            .iter()
            .filter(|(player_id, _)| {
                session
                    .players
                    .get(*player_id)
                    .is_some_and(|player| player.group_id == group_id)
            })
            .map(|(player_id, drafts)| (*player_id, drafts.clone()))
            .collect();

        let mut round_ids = Vec::with_capacity(narrators.len());
        for (index, (narrator_id, drafts)) in (1..).zip(narrators) {
            let mut round = Round::draft(party_id, Some(group_id), Phase::One, index, narrator_id);
            round.attach_statements(drafts);
            if index == 1 {
                round.apply(RoundEvent::OpenVoting)?;
                round.started_at = Some(now);
            }
            round_ids.push(round.id);
            session.put_round(round);
        }

        let status = if round_ids.is_empty() {
            GroupStatus::Done
        } else {
            GroupStatus::Playing
        };
        if let Some(group) = session.party.group_mut(group_id) {
            group.status = status;
        }
        session
            .party
            .rounds_by_group
            .insert(group_id, RoundCursor::new(round_ids));
    }

    info!(
        party = %session.party.code,
        reason = ?reason,
        narrators = session.party.prep_statements.len(),
        "phase 1 started"
    );
    complete_phase1_if_all_done(session, now);
    Ok(true)
}

fn complete_phase1_if_all_done(session: &mut PartySession, now: SystemTime) {
    let party = &mut session.party;
    if party
        .groups
        .iter()
        .all(|group| group.status == GroupStatus::Done)
        && party.phase1.complete(now, CompletionReason::AllPlayed)
    {
        info!(party = %party.code, "phase 1 completed");
    }
}

/// Open the next round of a group once its current round closed.
pub fn advance_phase1_group(
    session: &mut PartySession,
    group_id: Uuid,
    now: SystemTime,
) -> Result<(), ServiceError> {
    let Some(cursor) = session.party.rounds_by_group.get_mut(&group_id) else {
        return Ok(());
    };

    match cursor.advance() {
        Some(next_id) => {
            let round = session.round_mut(next_id).ok_or_else(|| {
                ServiceError::Corrupted(format!("phase 1 round {next_id} is missing"))
            })?;
            round.apply(RoundEvent::OpenVoting)?;
            round.started_at = Some(now);
            debug!(round_id = %next_id, group_id = %group_id, "next phase 1 round opened");
        }
        None => {
            if let Some(group) = session.party.group_mut(group_id) {
                group.status = GroupStatus::Done;
            }
            complete_phase1_if_all_done(session, now);
        }
    }
    Ok(())
}

/// Pick each group's best liars and open the cross-group rounds.
pub fn start_phase2(
    session: &mut PartySession,
    requester_id: Uuid,
    now: SystemTime,
) -> Result<(), ServiceError> {
    assert_member(session, requester_id)?;
    if session.party.groups.len() < 2 {
        return Err(ServiceError::Conflict(
            "phase 2 requires at least 2 groups".into(),
        ));
    }
    if session.party.status != PartyStatus::RunningPhase1 {
        return Err(ServiceError::Conflict(
            "phase 2 can only start after phase 1".into(),
        ));
    }
    if !session.party.phase1.is_completed() {
        return Err(ServiceError::Conflict("phase 1 is not completed yet".into()));
    }

    let narrators = phase2_narrators(session);
    if narrators.is_empty() {
        return Err(ServiceError::Conflict(
            "no phase 2 narrators available".into(),
        ));
    }

    session.party.apply(PartyEvent::StartPhase2)?;
    session.party.phase2 = PhaseTiming::open(now, session.party.settings.phase_time_limit_sec);

    let party_id = session.party.id;
    let mut round_ids = Vec::with_capacity(narrators.len());
    for (index, narrator_id) in (1..).zip(narrators) {
        let mut round = Round::draft(party_id, None, Phase::Two, index, narrator_id);
        if index == 1 {
            round.apply(RoundEvent::OpenQuestioning)?;
            round.started_at = Some(now);
        }
        round_ids.push(round.id);
        session.put_round(round);
    }

    info!(
        party = %session.party.code,
        rounds = round_ids.len(),
        "phase 2 started"
    );
    session.party.phase2_rounds = RoundCursor::new(round_ids);
    Ok(())
}

/// Minimum-leak players of every group, ties included, in group index order.
fn phase2_narrators(session: &PartySession) -> Vec<Uuid> {
    let leak = |player: &Player| {
        session
            .party
            .leak_scores
            .get(&player.id)
            .copied()
            .unwrap_or(0)
    };

    let mut groups: Vec<_> = session.party.groups.iter().collect();
    groups.sort_by_key(|group| group.index);

    let mut narrators = Vec::new();
    for group in groups {
        let Some(min_leak) = session.group_members(group.id).map(leak).min() else {
            continue;
        };
        narrators.extend(
            session
                .group_members(group.id)
                .filter(|player| leak(*player) == min_leak)
                .map(|player| player.id),
        );
    }
    narrators
}

/// Open the next phase-2 round, or finish the party after the last one.
pub fn advance_phase2(session: &mut PartySession, now: SystemTime) -> Result<(), ServiceError> {
    match session.party.phase2_rounds.advance() {
        Some(next_id) => {
            let round = session.round_mut(next_id).ok_or_else(|| {
                ServiceError::Corrupted(format!("phase 2 round {next_id} is missing"))
            })?;
            round.apply(RoundEvent::OpenQuestioning)?;
            round.started_at = Some(now);
            debug!(round_id = %next_id, "next phase 2 round opened");
            Ok(())
        }
        None => complete_phase2(session, CompletionReason::AllPlayed, now),
    }
}

fn complete_phase2(
    session: &mut PartySession,
    reason: CompletionReason,
    now: SystemTime,
) -> Result<(), ServiceError> {
    if session.party.phase2.complete(now, reason) {
        session.party.apply(PartyEvent::Phase2Completed)?;
        info!(party = %session.party.code, reason = ?reason, "party finished");
    }
    Ok(())
}

/// Close an open current round without advancing, then skip every queued round.
fn wind_down(
    session: &mut PartySession,
    cursor: &RoundCursor,
    now: SystemTime,
) -> Result<Vec<Uuid>, ServiceError> {
    if let Some(current) = cursor.current_id() {
        if session.round(current).is_some_and(|round| round.status.is_open()) {
            round_engine::close_round(session, current, now, CloseMode::Hold)?;
        }
    }

    let mut skipped = Vec::new();
    for round_id in &cursor.round_ids {
        let Some(round) = session.round(*round_id) else {
            continue;
        };
        if round.status != RoundStatus::Draft {
            continue;
        }
        if let Some(round) = session.round_mut(*round_id) {
            round.apply(RoundEvent::Skip)?;
            round.ended_at = Some(now);
            skipped.push(round.narrator_id);
        }
    }
    Ok(skipped)
}

fn force_finish_phase1(session: &mut PartySession, now: SystemTime) -> Result<(), ServiceError> {
    session.party.phase1.complete(now, CompletionReason::TimeLimit);

    let cursors: Vec<(Uuid, RoundCursor)> = session
        .party
        .rounds_by_group
        .iter()
        .map(|(group_id, cursor)| (*group_id, cursor.clone()))
        .collect();
    for (group_id, cursor) in cursors {
        for narrator_id in wind_down(session, &cursor, now)? {
            session.party.leak_scores.insert(narrator_id, 0);
        }
        if let Some(cursor) = session.party.rounds_by_group.get_mut(&group_id) {
            cursor.exhaust();
        }
    }
    for group in &mut session.party.groups {
        group.status = GroupStatus::Done;
    }

    info!(party = %session.party.code, "phase 1 forced to finish on time limit");
    Ok(())
}

fn force_finish_phase2(session: &mut PartySession, now: SystemTime) -> Result<(), ServiceError> {
    let cursor = session.party.phase2_rounds.clone();
    wind_down(session, &cursor, now)?;
    session.party.phase2_rounds.exhaust();
    complete_phase2(session, CompletionReason::TimeLimit, now)
}

/// Apply every phase deadline that has passed at `now`.
///
/// Returns whether the session changed. Safe to call at any cadence.
pub fn enforce_deadlines(session: &mut PartySession, now: SystemTime) -> Result<bool, ServiceError> {
    let mut changed = false;

    if session.party.status == PartyStatus::RunningPhase1Prep
        && session.party.phase1_prep.is_overdue(now)
    {
        changed |= finalize_phase1_prep(session, CompletionReason::TimeLimit, now)?;
    }

    if session.party.status == PartyStatus::RunningPhase1 && session.party.phase1.is_overdue(now) {
        force_finish_phase1(session, now)?;
        changed = true;
    }

    if session.party.status == PartyStatus::RunningPhase2 && session.party.phase2.is_overdue(now) {
        force_finish_phase2(session, now)?;
        changed = true;
    }

    Ok(changed)
}

/// Earliest pending deadline of the party, if any phase is still timed.
pub fn next_deadline(party: &Party) -> Option<SystemTime> {
    let timing = match party.status {
        PartyStatus::RunningPhase1Prep => &party.phase1_prep,
        PartyStatus::RunningPhase1 => &party.phase1,
        PartyStatus::RunningPhase2 => &party.phase2,
        PartyStatus::Lobby | PartyStatus::Finished => return None,
    };
    if timing.is_completed() {
        None
    } else {
        timing.deadline_at
    }
}
