//! Round lifecycle: statement submission, vote acceptance, closure and scoring.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::validation,
    error::ServiceError,
    services::phase_service,
    state::{
        game::{PartySession, Phase, Round, RoundRecord, StatementDraft, Vote, VoteOutcome},
        state_machine::{RoundEvent, RoundStatus},
    },
};

/// What happens to the round sequence once a round closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Open the next round of the sequence (or complete the phase).
    Advance,
    /// Leave the sequence untouched; used when a phase is forced to end.
    Hold,
}

/// Players allowed to vote on `round`, recomputed from current membership.
///
/// Phase 1: the narrator's group minus the narrator. Phase 2: every member
/// except the narrator and the players who already judged this narrator.
pub fn eligible_voters(session: &PartySession, round: &Round) -> Vec<Uuid> {
    session
        .players
        .values()
        .filter(|player| player.id != round.narrator_id)
        .filter(|player| match round.phase {
            Phase::One => Some(player.group_id) == round.group_id,
            Phase::Two => !session
                .party
                .seen_narrators
                .get(&player.id)
                .is_some_and(|seen| seen.contains(&round.narrator_id)),
        })
        .map(|player| player.id)
        .collect()
}

/// Attach the narrator's statements to a phase-2 round and open voting.
pub fn submit_round_statements(
    session: &mut PartySession,
    round_id: Uuid,
    narrator_id: Uuid,
    items: Vec<StatementDraft>,
) -> Result<Round, ServiceError> {
    let round = session
        .round(round_id)
        .ok_or_else(|| ServiceError::NotFound("round not found".into()))?;
    if round.narrator_id != narrator_id {
        return Err(ServiceError::Unauthorized(
            "only narrator can submit statements".into(),
        ));
    }
    if round.phase == Phase::One {
        return Err(ServiceError::Conflict(
            "phase 1 statements are now collected at game start".into(),
        ));
    }
    if round.status != RoundStatus::Questioning {
        return Err(ServiceError::Conflict(
            "round not in questioning state".into(),
        ));
    }

    let drafts = validation::validate_statements(items)?;
    let round = session
        .round_mut(round_id)
        .ok_or_else(|| ServiceError::NotFound("round not found".into()))?;
    round.attach_statements(drafts);
    round.apply(RoundEvent::StatementsSubmitted)?;
    info!(round_id = %round_id, "phase 2 statements submitted");
    Ok(round.clone())
}

/// Record a vote and close the round once every eligible voter has voted.
pub fn record_vote(
    session: &mut PartySession,
    round_id: Uuid,
    player_id: Uuid,
    statement_id: Uuid,
    now: SystemTime,
) -> Result<RoundStatus, ServiceError> {
    let round = session
        .round(round_id)
        .ok_or_else(|| ServiceError::NotFound("round not found".into()))?;
    if round.status != RoundStatus::Voting {
        return Err(ServiceError::Conflict("round not in voting state".into()));
    }
    if !session.is_member(player_id) {
        return Err(ServiceError::NotFound("party/player not found".into()));
    }

    let eligible = eligible_voters(session, round);
    if !eligible.contains(&player_id) {
        return Err(ServiceError::Unauthorized(
            "player is not eligible to vote on this round".into(),
        ));
    }
    if round.votes.contains_key(&player_id) {
        return Err(ServiceError::Conflict("already voted".into()));
    }
    let statement = round
        .statement(statement_id)
        .ok_or_else(|| ServiceError::NotFound("statement not found".into()))?;

    let vote = Vote {
        id: Uuid::new_v4(),
        player_id,
        statement_id,
        is_correct: statement.is_lie,
        rank_correct: None,
        points: 0,
        created_at: now,
        seq: round.votes.len() as u32,
        time_to_vote_ms: None,
    };

    let round = session
        .round_mut(round_id)
        .ok_or_else(|| ServiceError::NotFound("round not found".into()))?;
    round.votes.insert(player_id, vote);
    let recorded = round.votes.len();
    debug!(
        round_id = %round_id,
        player_id = %player_id,
        recorded,
        required = eligible.len(),
        "vote recorded"
    );

    if recorded >= eligible.len() {
        close_round(session, round_id, now, CloseMode::Advance)?;
    }

    session
        .round(round_id)
        .map(|round| round.status)
        .ok_or_else(|| ServiceError::Corrupted(format!("round {round_id} vanished")))
}

/// Force-close a round on behalf of a party member.
pub fn close_round_by_member(
    session: &mut PartySession,
    round_id: Uuid,
    requester_id: Uuid,
    now: SystemTime,
) -> Result<(), ServiceError> {
    let round = session
        .round(round_id)
        .ok_or_else(|| ServiceError::NotFound("round not found".into()))?;
    if !session.is_member(requester_id) {
        return Err(ServiceError::Unauthorized("party member only".into()));
    }
    if !round.status.is_open() {
        return Err(ServiceError::Conflict(
            "round cannot be closed in current state".into(),
        ));
    }

    close_round(session, round_id, now, CloseMode::Advance)?;
    Ok(())
}

/// Reveal the lie, score the votes and close the round.
///
/// Returns `false` without touching anything when the round is already closed.
pub fn close_round(
    session: &mut PartySession,
    round_id: Uuid,
    now: SystemTime,
    mode: CloseMode,
) -> Result<bool, ServiceError> {
    let round = session
        .round(round_id)
        .ok_or_else(|| ServiceError::NotFound("round not found".into()))?;
    if round.status == RoundStatus::Closed {
        return Ok(false);
    }
    round.status.next(RoundEvent::Reveal)?;
    let voters = eligible_voters(session, round);

    let mut round = session
        .take_round(round_id)
        .ok_or_else(|| ServiceError::Corrupted(format!("round {round_id} vanished")))?;
    round.apply(RoundEvent::Reveal)?;
    round.revealed_lie_statement_id = round.lie().map(|statement| statement.id);

    let mut correct: Vec<(SystemTime, u32, Uuid)> = round
        .votes
        .values()
        .filter(|vote| vote.is_correct)
        .map(|vote| (vote.created_at, vote.seq, vote.player_id))
        .collect();
    correct.sort();

    let voter_count = voters.len() as u32;
    let multiplier = round.multiplier(session.party.phase2_multiplier);
    for (rank, (_, _, player_id)) in correct.iter().enumerate() {
        if let Some(vote) = round.votes.get_mut(player_id) {
            let rank = rank as u32;
            vote.rank_correct = Some(rank + 1);
            vote.points = voter_count.saturating_sub(rank).max(1) * multiplier;
        }
    }

    let started_at = round.started_at;
    for vote in round.votes.values_mut() {
        vote.time_to_vote_ms = started_at.map(|start| {
            vote.created_at
                .duration_since(start)
                .unwrap_or_default()
                .as_millis() as u64
        });
        if let Some(score) = session.party.scores.get_mut(&vote.player_id) {
            score.add(round.phase, vote.points);
        }
    }

    session.party.round_history.push(RoundRecord {
        round_id: round.id,
        phase: round.phase,
        index: round.index,
        group_id: round.group_id,
        narrator_id: round.narrator_id,
        started_at: round.started_at,
        ended_at: now,
        revealed_lie_statement_id: round.revealed_lie_statement_id,
        lie_text: round.lie().map(|statement| statement.text.clone()),
        votes: round
            .votes
            .values()
            .map(|vote| VoteOutcome {
                player_id: vote.player_id,
                statement_id: vote.statement_id,
                is_correct: vote.is_correct,
                points: vote.points,
                rank_correct: vote.rank_correct,
                time_to_vote_ms: vote.time_to_vote_ms,
                picked_text: round
                    .statement(vote.statement_id)
                    .map(|statement| statement.text.clone()),
            })
            .collect(),
    });

    if round.phase == Phase::One {
        let leak = round.votes.values().map(|vote| vote.points).sum();
        session.party.leak_scores.insert(round.narrator_id, leak);
        for voter in &voters {
            session
                .party
                .seen_narrators
                .entry(*voter)
                .or_default()
                .insert(round.narrator_id);
        }
    }

    round.apply(RoundEvent::Settle)?;
    round.ended_at = Some(now);
    let (phase, group_id) = (round.phase, round.group_id);
    info!(
        party = %session.party.code,
        round_id = %round_id,
        phase = phase.number(),
        votes = round.votes.len(),
        "round closed"
    );
    session.put_round(round);

    if mode == CloseMode::Advance {
        match (phase, group_id) {
            (Phase::One, Some(group_id)) => {
                phase_service::advance_phase1_group(session, group_id, now)?
            }
            (Phase::One, None) => {
                return Err(ServiceError::Corrupted(format!(
                    "phase 1 round {round_id} has no group"
                )));
            }
            (Phase::Two, _) => phase_service::advance_phase2(session, now)?,
        }
    }

    Ok(true)
}
