//! Builds the client-facing [`PartySnapshot`] from a loaded party.
//!
//! The projection is a pure read: it never mutates the session and hides the
//! lie of every round that is not closed yet.

use std::{cmp::Reverse, collections::HashMap};

use uuid::Uuid;

use crate::{
    dto::{
        format_system_time,
        snapshot::{
            FinalWinner, GroupMember, GroupResult, GroupScoreLine, GroupView, LastReveal,
            LeaderboardEntry, MistakenPlayer, PartySnapshot, Phase1Results, Phase1Winner,
            Phase2Eligibility, Phase2Results, PhaseResultsView, PhaseTimingView, PlayerView,
            PrepTimingView, RevealVote, RoundView, StatementView, SubmittedPlayer, TimingView,
        },
    },
    state::{
        game::{PartySession, Phase, PhaseTiming, Round, RoundCursor},
        state_machine::RoundStatus,
    },
};

const SINGLE_GROUP_REASON: &str = "single_group_no_phase2";

/// Project the session into the snapshot served to clients.
pub fn build_snapshot(session: &PartySession) -> PartySnapshot {
    let party = &session.party;
    let leaderboard = leaderboard(session);
    let phase2_allowed = party.groups.len() >= 2;

    PartySnapshot {
        id: party.id,
        code: party.code.clone(),
        status: party.status,
        round_timer_sec: party.settings.round_timer_sec,
        phase_time_limit_sec: party.settings.phase_time_limit_sec,
        statement_time_limit_sec: party.settings.statement_time_limit_sec,
        phase2_multiplier: party.phase2_multiplier,
        host_player_id: party.host_player_id,
        phase_timing: PhaseTimingView {
            phase1_prep: prep_timing(session),
            phase1: timing(&party.phase1),
            phase2: timing(&party.phase2),
        },
        phase_results: PhaseResultsView {
            phase1: phase1_results(session),
            phase2: phase2_results(session, &leaderboard),
        },
        phase2_eligibility: Phase2Eligibility {
            allowed: phase2_allowed,
            reason: (!phase2_allowed).then(|| SINGLE_GROUP_REASON.to_string()),
        },
        last_reveal: last_reveal(session),
        groups: party
            .groups
            .iter()
            .map(|group| GroupView {
                id: group.id,
                index: group.index,
                status: group.status,
                players: session
                    .group_members(group.id)
                    .map(|player| GroupMember {
                        id: player.id,
                        nickname: player.nickname.clone(),
                        is_host: player.is_host,
                    })
                    .collect(),
                current_round: party
                    .rounds_by_group
                    .get(&group.id)
                    .and_then(|cursor| current_round(session, cursor)),
            })
            .collect(),
        players: session
            .players
            .values()
            .map(|player| PlayerView {
                id: player.id,
                nickname: player.nickname.clone(),
                group_id: player.group_id,
                is_host: player.is_host,
            })
            .collect(),
        phase2_current_round: current_round(session, &party.phase2_rounds),
        leaderboard,
    }
}

fn timing(timing: &PhaseTiming) -> TimingView {
    TimingView {
        started_at: timing.started_at.map(format_system_time),
        deadline_at: timing.deadline_at.map(format_system_time),
        completed_at: timing.completed_at.map(format_system_time),
        completion_reason: timing.completion_reason,
    }
}

fn prep_timing(session: &PartySession) -> PrepTimingView {
    let submitted_players: Vec<SubmittedPlayer> = session
        .party
        .prep_statements
        .keys()
        .filter_map(|id| {
            session.players.get(id).map(|player| SubmittedPlayer {
                player_id: player.id,
                nickname: player.nickname.clone(),
            })
        })
        .collect();

    PrepTimingView {
        timing: timing(&session.party.phase1_prep),
        submitted_count: submitted_players.len(),
        total_players: session.players.len(),
        submitted_players,
    }
}

fn current_round(session: &PartySession, cursor: &RoundCursor) -> Option<RoundView> {
    cursor
        .current_id()
        .and_then(|id| session.round(id))
        .map(round_view)
}

/// Public view of a round.
pub fn round_view(round: &Round) -> RoundView {
    let closed = round.status == RoundStatus::Closed;
    let statements = if round.status == RoundStatus::Questioning {
        Vec::new()
    } else {
        round
            .statements
            .iter()
            .map(|statement| StatementView {
                id: statement.id,
                text: statement.text.clone(),
                display_order: statement.display_order,
                is_lie: closed.then_some(statement.is_lie),
            })
            .collect()
    };

    RoundView {
        id: round.id,
        phase: round.phase.number(),
        index: round.index,
        group_id: round.group_id,
        narrator_id: round.narrator_id,
        status: round.status,
        statements,
        revealed_lie_statement_id: round
            .revealed_lie_statement_id
            .filter(|_| closed),
        votes_count: round.votes.len(),
        voter_ids: round.votes.keys().copied().collect(),
        started_at: round.started_at.map(format_system_time),
        ended_at: round.ended_at.map(format_system_time),
    }
}

fn nickname_or_id(session: &PartySession, player_id: Uuid) -> String {
    session
        .nickname(player_id)
        .map(str::to_string)
        .unwrap_or_else(|| player_id.to_string())
}

fn leaderboard(session: &PartySession) -> Vec<LeaderboardEntry> {
    let party = &session.party;
    let mut entries: Vec<LeaderboardEntry> = session
        .players
        .values()
        .map(|player| {
            let score = party.scores.get(&player.id).copied().unwrap_or_default();
            LeaderboardEntry {
                player_id: player.id,
                nickname: player.nickname.clone(),
                group_id: player.group_id,
                phase1: score.phase1,
                phase2: score.phase2,
                total: score.total,
                leak_score: party.leak_scores.get(&player.id).copied(),
            }
        })
        .collect();
    entries.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.nickname.cmp(&b.nickname))
    });
    entries
}

/// Fastest correct vote of `player_id` in `phase`, in seconds with two decimals.
fn best_find_time_sec(session: &PartySession, phase: Phase, player_id: Uuid) -> Option<f64> {
    session
        .party
        .round_history
        .iter()
        .filter(|record| record.phase == phase)
        .flat_map(|record| record.votes.iter())
        .filter(|vote| vote.player_id == player_id && vote.is_correct)
        .filter_map(|vote| vote.time_to_vote_ms)
        .min()
        .map(|ms| (ms as f64 / 10.0).round() / 100.0)
}

fn mistaken_players(session: &PartySession, phase: Phase) -> Vec<MistakenPlayer> {
    let mut counts: HashMap<Uuid, u32> = HashMap::new();
    for vote in session
        .party
        .round_history
        .iter()
        .filter(|record| record.phase == phase)
        .flat_map(|record| record.votes.iter())
        .filter(|vote| !vote.is_correct)
    {
        *counts.entry(vote.player_id).or_default() += 1;
    }

    let mut mistaken: Vec<MistakenPlayer> = counts
        .into_iter()
        .map(|(player_id, wrong_count)| MistakenPlayer {
            player_id,
            nickname: nickname_or_id(session, player_id),
            wrong_count,
        })
        .collect();
    mistaken.sort_by(|a, b| {
        (Reverse(a.wrong_count), &a.nickname).cmp(&(Reverse(b.wrong_count), &b.nickname))
    });
    mistaken
}

fn phase1_results(session: &PartySession) -> Option<Phase1Results> {
    let party = &session.party;
    if !party.phase1.is_completed() {
        return None;
    }

    let groups = party
        .groups
        .iter()
        .map(|group| {
            let lines: Vec<GroupScoreLine> = session
                .group_members(group.id)
                .map(|player| GroupScoreLine {
                    player_id: player.id,
                    nickname: player.nickname.clone(),
                    phase1: party
                        .scores
                        .get(&player.id)
                        .map(|score| score.phase1)
                        .unwrap_or(0),
                    leak_score: party.leak_scores.get(&player.id).copied().unwrap_or(0),
                })
                .collect();
            let best = lines.iter().map(|line| line.phase1).max();
            let min_leak = lines.iter().map(|line| line.leak_score).min();

            GroupResult {
                group_id: group.id,
                group_index: group.index,
                winners: lines
                    .iter()
                    .filter(|line| Some(line.phase1) == best)
                    .map(|line| Phase1Winner {
                        best_find_time_sec: best_find_time_sec(session, Phase::One, line.player_id),
                        line: line.clone(),
                    })
                    .collect(),
                best_liars: lines
                    .iter()
                    .filter(|line| Some(line.leak_score) == min_leak)
                    .cloned()
                    .collect(),
            }
        })
        .collect();

    Some(Phase1Results {
        completed_at: party.phase1.completed_at.map(format_system_time),
        completion_reason: party.phase1.completion_reason,
        groups,
        mistaken_players: mistaken_players(session, Phase::One),
    })
}

fn phase2_results(session: &PartySession, leaderboard: &[LeaderboardEntry]) -> Option<Phase2Results> {
    let party = &session.party;
    if !party.phase2.is_completed() {
        return None;
    }

    let best = leaderboard.iter().map(|entry| entry.total).max();
    Some(Phase2Results {
        completed_at: party.phase2.completed_at.map(format_system_time),
        completion_reason: party.phase2.completion_reason,
        final_winners: leaderboard
            .iter()
            .filter(|entry| Some(entry.total) == best)
            .map(|entry| FinalWinner {
                best_find_time_sec: best_find_time_sec(session, Phase::Two, entry.player_id),
                entry: entry.clone(),
            })
            .collect(),
        mistaken_players: mistaken_players(session, Phase::Two),
    })
}

fn last_reveal(session: &PartySession) -> Option<LastReveal> {
    let record = session.party.round_history.last()?;
    Some(LastReveal {
        round_id: record.round_id,
        phase: record.phase.number(),
        index: record.index,
        group_id: record.group_id,
        narrator_id: record.narrator_id,
        narrator_nickname: nickname_or_id(session, record.narrator_id),
        lie_text: record.lie_text.clone(),
        ended_at: format_system_time(record.ended_at),
        votes: record
            .votes
            .iter()
            .map(|vote| RevealVote {
                player_id: vote.player_id,
                nickname: nickname_or_id(session, vote.player_id),
                is_correct: vote.is_correct,
                points: vote.points,
                rank_correct: vote.rank_correct,
                time_to_vote_ms: vote.time_to_vote_ms,
                picked_text: vote.picked_text.clone(),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::{
        services::{
            phase_service::{self, GroupPlacement, PartyOptions},
            round_engine,
        },
        state::game::{CompletionReason, StatementDraft},
    };

    fn drafts() -> Vec<StatementDraft> {
        ["one", "two", "three"]
            .into_iter()
            .enumerate()
            .map(|(n, text)| StatementDraft {
                text: text.into(),
                is_lie: n == 2,
            })
            .collect()
    }

    fn party(groups: u32, nicknames: &[&str]) -> (PartySession, Vec<Uuid>) {
        let now = SystemTime::now();
        let options = PartyOptions {
            groups,
            round_timer_sec: 120,
            phase_time_limit_sec: 600,
            statement_time_limit_sec: 120,
        };
        let mut session = phase_service::new_party("SNAP1".into(), options, now).unwrap();
        let ids = nicknames
            .iter()
            .map(|nickname| {
                phase_service::join(&mut session, nickname, GroupPlacement::Auto, now)
                    .unwrap()
                    .player_id
            })
            .collect();
        (session, ids)
    }

    #[test]
    fn single_group_party_is_not_phase2_eligible() {
        let (session, _) = party(1, &["Ann", "Bob"]);
        let snapshot = build_snapshot(&session);
        assert!(!snapshot.phase2_eligibility.allowed);
        assert_eq!(
            snapshot.phase2_eligibility.reason.as_deref(),
            Some(SINGLE_GROUP_REASON)
        );
        assert!(snapshot.last_reveal.is_none());
        assert!(snapshot.phase_results.phase1.is_none());
    }

    #[test]
    fn open_round_hides_the_lie() {
        let (mut session, ids) = party(1, &["Ann", "Bob", "Cid"]);
        let now = SystemTime::now();
        for id in &ids {
            phase_service::submit_phase1_statements(&mut session, *id, drafts(), now).unwrap();
        }

        let snapshot = build_snapshot(&session);
        let round = snapshot.groups[0].current_round.as_ref().unwrap();
        assert_eq!(round.status, RoundStatus::Voting);
        assert_eq!(round.statements.len(), 3);
        assert!(round.statements.iter().all(|s| s.is_lie.is_none()));
        assert!(round.revealed_lie_statement_id.is_none());

        let json = serde_json::to_value(round).unwrap();
        assert!(json["statements"][0].get("isLie").is_none());
    }

    #[test]
    fn leaderboard_and_reveal_follow_votes() {
        let (mut session, ids) = party(1, &["Dan", "Ann", "Bob"]);
        let now = SystemTime::now();
        for id in &ids {
            phase_service::submit_phase1_statements(&mut session, *id, drafts(), now).unwrap();
        }
        let group_id = session.party.groups[0].id;
        let round_id = session.party.rounds_by_group[&group_id].current_id().unwrap();
        let round = session.round(round_id).unwrap().clone();
        let lie = round.lie().unwrap().id;
        let truth = round.statements[0].id;

        round_engine::record_vote(
            &mut session,
            round_id,
            ids[1],
            lie,
            now + Duration::from_millis(1234),
        )
        .unwrap();
        round_engine::record_vote(&mut session, round_id, ids[2], truth, now).unwrap();

        let snapshot = build_snapshot(&session);
        let reveal = snapshot.last_reveal.unwrap();
        assert_eq!(reveal.narrator_nickname, "Dan");
        assert_eq!(reveal.lie_text.as_deref(), Some("three"));
        assert_eq!(reveal.votes.len(), 2);

        let board: Vec<&str> = snapshot
            .leaderboard
            .iter()
            .map(|entry| entry.nickname.as_str())
            .collect();
        assert_eq!(board, vec!["Ann", "Bob", "Dan"]);
        assert_eq!(snapshot.leaderboard[0].total, 2);
        assert_eq!(snapshot.leaderboard[2].leak_score, Some(2));
        assert_eq!(snapshot.leaderboard[1].leak_score, None);

        assert_eq!(best_find_time_sec(&session, Phase::One, ids[1]), Some(1.23));
        let mistaken = mistaken_players(&session, Phase::One);
        assert_eq!(mistaken.len(), 1);
        assert_eq!(mistaken[0].nickname, "Bob");
    }

    #[test]
    fn phase1_results_list_winners_and_best_liars() {
        let (mut session, ids) = party(1, &["Ann", "Bob"]);
        let now = SystemTime::now();
        session.party.phase1.complete(now, CompletionReason::TimeLimit);
        session.party.leak_scores.insert(ids[0], 4);
        if let Some(score) = session.party.scores.get_mut(&ids[0]) {
            score.add(Phase::One, 3);
        }

        let results = build_snapshot(&session).phase_results.phase1.unwrap();
        assert_eq!(results.completion_reason, Some(CompletionReason::TimeLimit));
        let group = &results.groups[0];
        assert_eq!(group.winners.len(), 1);
        assert_eq!(group.winners[0].line.player_id, ids[0]);
        assert_eq!(group.best_liars.len(), 1);
        assert_eq!(group.best_liars[0].player_id, ids[1]);
    }

    #[test]
    fn reading_a_snapshot_has_no_side_effects() {
        let (session, _) = party(2, &["Ann", "Bob", "Cid"]);
        assert_eq!(build_snapshot(&session), build_snapshot(&session));
    }
}
